//! Position aggregation: collapses duplicate line items of one snapshot into
//! canonical per-security totals.
//!
//! Filings routinely split one holding across several rows (different
//! managers, share classes of the same CUSIP). Rows are grouped by security
//! id and instrument kind, so stock and CALL/PUT lines on one CUSIP stay
//! separate positions. The aggregator sums each group,
//! drops rows that cannot be trusted, and reports each dropped row as an
//! [`Anomaly`] instead of failing the snapshot.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::{
    normalize_ticker, DisclosureDate, EntityId, Position, PositionKey, RawPosition, SecurityId,
    Snapshot,
};
use crate::resolver::SecurityResolver;

/// Why an input record was excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    MissingSecurityId,
    InvalidSecurityId,
    NonNumericShares,
    NonNumericValue,
    NegativeShares,
    NegativeValue,
    MissingDate,
    InvalidDate,
    DuplicateDate,
    InvalidEntity,
    UnknownEntity,
    InvalidTotalValue,
}

impl AnomalyKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingSecurityId => "missing_security_id",
            Self::InvalidSecurityId => "invalid_security_id",
            Self::NonNumericShares => "non_numeric_shares",
            Self::NonNumericValue => "non_numeric_value",
            Self::NegativeShares => "negative_shares",
            Self::NegativeValue => "negative_value",
            Self::MissingDate => "missing_date",
            Self::InvalidDate => "invalid_date",
            Self::DuplicateDate => "duplicate_date",
            Self::InvalidEntity => "invalid_entity",
            Self::UnknownEntity => "unknown_entity",
            Self::InvalidTotalValue => "invalid_total_value",
        }
    }
}

impl Display for AnomalyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record excluded from aggregation, returned alongside results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomaly {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of_date: Option<DisclosureDate>,
    /// Zero-based index of the offending row (or snapshot, for date anomalies).
    pub row: usize,
    pub kind: AnomalyKind,
}

/// Canonical view of one snapshot: at most one [`Position`] per
/// [`PositionKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSnapshot {
    pub entity_id: EntityId,
    pub as_of_date: DisclosureDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reported_total: Option<f64>,
    #[serde(
        serialize_with = "serialize_positions",
        deserialize_with = "deserialize_positions"
    )]
    positions: BTreeMap<PositionKey, Position>,
}

impl AggregatedSnapshot {
    pub fn new(
        entity_id: EntityId,
        as_of_date: DisclosureDate,
        positions: impl IntoIterator<Item = Position>,
    ) -> Self {
        Self {
            entity_id,
            as_of_date,
            reported_total: None,
            positions: by_key(positions),
        }
    }

    pub fn with_reported_total(mut self, total: f64) -> Self {
        self.reported_total = Some(total).filter(|value| value.is_finite() && *value >= 0.0);
        self
    }

    pub fn get(&self, key: &PositionKey) -> Option<&Position> {
        self.positions.get(key)
    }

    /// The equity position of `security_id`, if held.
    pub fn equity(&self, security_id: &SecurityId) -> Option<&Position> {
        self.get(&PositionKey::equity(security_id.clone()))
    }

    /// Positions in ascending `(security_id, instrument_kind)` order.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Positions that are not CALL/PUT contracts.
    pub fn non_option_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions()
            .filter(|position| !position.instrument_kind.is_option())
    }

    pub fn keys(&self) -> impl Iterator<Item = &PositionKey> {
        self.positions.keys()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sum of aggregated position values.
    pub fn position_total(&self) -> f64 {
        self.positions.values().map(|position| position.value).sum()
    }

    /// Filing-reported total when present, otherwise [`Self::position_total`].
    pub fn reported_total(&self) -> f64 {
        self.reported_total.unwrap_or_else(|| self.position_total())
    }

    /// Fill missing tickers and names from a resolver, returning a new snapshot.
    pub fn with_resolved(&self, resolver: &dyn SecurityResolver) -> Self {
        let mut resolved = self.clone();
        for position in resolved.positions.values_mut() {
            if position.ticker.is_some() && !position.name.is_empty() {
                continue;
            }
            let resolution = resolver.resolve(&position.security_id);
            if position.ticker.is_none() {
                position.ticker = normalize_ticker(resolution.ticker.as_deref());
            }
            if position.name.is_empty() {
                if let Some(name) = resolution.display_name {
                    position.name = name;
                }
            }
        }
        resolved
    }
}

/// Output of [`aggregate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub snapshot: AggregatedSnapshot,
    pub anomalies: Vec<Anomaly>,
}

struct ValidRow<'a> {
    key: PositionKey,
    raw: &'a RawPosition,
    shares: f64,
    value: f64,
}

/// Collapse duplicate rows of `snapshot` into one position per security and
/// instrument kind. Rows without a kind count as EQUITY.
///
/// Within a group the first non-empty name and ticker win. Share and value
/// totals are summed in a canonical order, so permuting the input rows never
/// changes them.
pub fn aggregate(snapshot: &Snapshot) -> Aggregation {
    let mut anomalies = Vec::new();
    let mut grouped: BTreeMap<PositionKey, Vec<ValidRow<'_>>> = BTreeMap::new();

    for (row, raw) in snapshot.positions.iter().enumerate() {
        match validate_row(raw) {
            Ok(valid) => grouped.entry(valid.key.clone()).or_default().push(valid),
            Err(kind) => anomalies.push(Anomaly {
                entity_id: Some(snapshot.entity_id.clone()),
                as_of_date: Some(snapshot.as_of_date),
                row,
                kind,
            }),
        }
    }

    let positions = grouped.into_iter().map(|(key, rows)| {
        let name = rows
            .iter()
            .filter_map(|row| row.raw.name.as_deref())
            .map(str::trim)
            .find(|name| !name.is_empty())
            .unwrap_or_default()
            .to_owned();
        let ticker = rows
            .iter()
            .find_map(|row| normalize_ticker(row.raw.ticker.as_deref()));

        Position {
            security_id: key.security_id,
            name,
            ticker,
            instrument_kind: key.instrument_kind,
            shares: canonical_sum(rows.iter().map(|row| row.shares)),
            value: canonical_sum(rows.iter().map(|row| row.value)),
        }
    });

    let mut aggregated =
        AggregatedSnapshot::new(snapshot.entity_id.clone(), snapshot.as_of_date, positions);
    if let Some(total) = snapshot.total_value {
        aggregated = aggregated.with_reported_total(total);
    }

    if !anomalies.is_empty() {
        tracing::debug!(
            entity = %snapshot.entity_id,
            as_of = %snapshot.as_of_date,
            excluded = anomalies.len(),
            "excluded malformed position rows"
        );
    }

    Aggregation {
        snapshot: aggregated,
        anomalies,
    }
}

fn validate_row(raw: &RawPosition) -> Result<ValidRow<'_>, AnomalyKind> {
    let security_id = match raw.security_id.as_deref().map(str::trim) {
        None | Some("") => return Err(AnomalyKind::MissingSecurityId),
        Some(id) => SecurityId::parse(id).map_err(|_| AnomalyKind::InvalidSecurityId)?,
    };

    let shares = match raw.shares {
        Some(shares) if shares.is_finite() => shares,
        _ => return Err(AnomalyKind::NonNumericShares),
    };
    if shares < 0.0 {
        return Err(AnomalyKind::NegativeShares);
    }

    let value = match raw.value {
        Some(value) if value.is_finite() => value,
        _ => return Err(AnomalyKind::NonNumericValue),
    };
    if value < 0.0 {
        return Err(AnomalyKind::NegativeValue);
    }

    Ok(ValidRow {
        key: PositionKey::new(security_id, raw.instrument_kind.unwrap_or_default()),
        raw,
        shares,
        value,
    })
}

fn canonical_sum(values: impl Iterator<Item = f64>) -> f64 {
    let mut values = values.collect::<Vec<_>>();
    values.sort_by(f64::total_cmp);
    values.into_iter().sum()
}

fn by_key(positions: impl IntoIterator<Item = Position>) -> BTreeMap<PositionKey, Position> {
    positions
        .into_iter()
        .map(|position| (position.key(), position))
        .collect()
}

// Positions serialize as a list; the key is derived from each entry.
fn serialize_positions<S>(
    positions: &BTreeMap<PositionKey, Position>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(positions.values())
}

fn deserialize_positions<'de, D>(deserializer: D) -> Result<BTreeMap<PositionKey, Position>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(by_key(Vec::<Position>::deserialize(deserializer)?))
}
