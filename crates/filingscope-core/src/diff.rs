//! Diff engine: classifies what changed between two consecutive aggregated
//! snapshots of one entity.
//!
//! Rules, applied per security and instrument kind:
//!
//! | Previous | Current | Event |
//! |----------|---------|-------|
//! | absent or 0 shares | present | `NewPosition` if value ≥ materiality |
//! | present | present | `Increased`/`Decreased` if \|Δshares %\| ≥ significance |
//! | present | absent | `SoldOut` if previous value ≥ materiality |
//!
//! Increases and decreases at or past the strong threshold carry a
//! [`Conviction`] tag. Option positions (CALL/PUT) are classified with the
//! same rules but returned in [`DiffReport::option_events`], never mixed into
//! equity events. A stock line and a call line on the same CUSIP are diffed
//! independently.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::aggregator::AggregatedSnapshot;
use crate::config::EngineConfig;
use crate::domain::{
    ChangeClassification, ChangeEvent, Conviction, DisclosureDate, EntityId, InstrumentKind,
    Position, SecurityId,
};
use crate::ValidationError;

/// Counts and totals for one diff, computed over equity events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub new_positions: usize,
    pub increased: usize,
    pub decreased: usize,
    pub sold_out: usize,
    pub strong_moves: usize,
    pub previous_total: f64,
    pub current_total: f64,
    pub total_value_change: f64,
}

/// Classified changes between two consecutive snapshots of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffReport {
    pub entity_id: EntityId,
    pub previous_date: DisclosureDate,
    pub current_date: DisclosureDate,
    pub events: Vec<ChangeEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub option_events: Vec<ChangeEvent>,
    pub summary: DiffSummary,
    /// Value change not attributed to any emitted event (suppressed noise,
    /// price-only moves). Events, option events, and this residual add up to
    /// the change in position totals.
    pub residual_value_delta: f64,
}

impl DiffReport {
    pub fn events_of(&self, classification: ChangeClassification) -> impl Iterator<Item = &ChangeEvent> {
        self.events
            .iter()
            .filter(move |event| event.classification == classification)
    }

    /// First event on `security_id`, looking at equity events before options.
    pub fn find(&self, security_id: &SecurityId) -> Option<&ChangeEvent> {
        self.events
            .iter()
            .chain(self.option_events.iter())
            .find(|event| &event.security_id == security_id)
    }

    pub fn find_kind(
        &self,
        security_id: &SecurityId,
        instrument_kind: InstrumentKind,
    ) -> Option<&ChangeEvent> {
        let events = if instrument_kind.is_option() {
            &self.option_events
        } else {
            &self.events
        };
        events.iter().find(|event| {
            &event.security_id == security_id && event.instrument_kind == instrument_kind
        })
    }
}

/// Compare `previous` against `current` and classify every material change.
///
/// Pure: identical inputs always produce identical, identically ordered output.
/// Events are sorted by absolute value change, largest first, with ties broken
/// by ascending security id, then instrument kind.
pub fn diff_snapshots(
    previous: &AggregatedSnapshot,
    current: &AggregatedSnapshot,
    config: &EngineConfig,
) -> Result<DiffReport, ValidationError> {
    if previous.entity_id != current.entity_id {
        return Err(ValidationError::EntityMismatch {
            previous: previous.entity_id.to_string(),
            current: current.entity_id.to_string(),
        });
    }
    if previous.as_of_date >= current.as_of_date {
        return Err(ValidationError::SnapshotsNotAscending {
            previous: previous.as_of_date.to_string(),
            current: current.as_of_date.to_string(),
        });
    }

    let keys = previous.keys().chain(current.keys()).collect::<BTreeSet<_>>();

    let mut events = Vec::new();
    let mut option_events = Vec::new();
    for key in keys {
        let event = classify(current, previous.get(key), current.get(key), config);
        if let Some(event) = event {
            if key.instrument_kind.is_option() {
                option_events.push(event);
            } else {
                events.push(event);
            }
        }
    }

    events.sort_by(by_magnitude);
    option_events.sort_by(by_magnitude);

    let previous_total = previous.position_total();
    let current_total = current.position_total();
    let attributed: f64 = events
        .iter()
        .chain(option_events.iter())
        .map(|event| event.delta_value)
        .sum();

    let summary = summarize(&events, previous_total, current_total);
    Ok(DiffReport {
        entity_id: current.entity_id.clone(),
        previous_date: previous.as_of_date,
        current_date: current.as_of_date,
        events,
        option_events,
        summary,
        residual_value_delta: (current_total - previous_total) - attributed,
    })
}

fn classify(
    current_snapshot: &AggregatedSnapshot,
    previous: Option<&Position>,
    current: Option<&Position>,
    config: &EngineConfig,
) -> Option<ChangeEvent> {
    match (previous, current) {
        (None, Some(current)) => {
            new_position(current_snapshot, None, current, config.materiality_threshold)
        }
        (Some(previous), Some(current)) if previous.shares == 0.0 => new_position(
            current_snapshot,
            Some(previous),
            current,
            config.materiality_threshold,
        ),
        (Some(previous), Some(current)) => {
            let delta_shares = current.shares - previous.shares;
            // `delta * 100 / base` keeps round boundaries (5.00%) exact.
            let percent = delta_shares * 100.0 / previous.shares;
            if percent.abs() < config.significance_threshold_pct || percent == 0.0 {
                return None;
            }

            let strong = percent.abs() >= config.strong_threshold_pct;
            let (classification, conviction) = if percent > 0.0 {
                (ChangeClassification::Increased, strong.then_some(Conviction::Buy))
            } else {
                (ChangeClassification::Decreased, strong.then_some(Conviction::Sell))
            };

            Some(event(
                current_snapshot,
                current,
                classification,
                conviction,
                (previous.shares, current.shares),
                (previous.value, current.value),
                Some(percent),
            ))
        }
        (Some(previous), None) => {
            if previous.value < config.materiality_threshold {
                return None;
            }
            Some(event(
                current_snapshot,
                previous,
                ChangeClassification::SoldOut,
                None,
                (previous.shares, 0.0),
                (previous.value, 0.0),
                Some(-100.0),
            ))
        }
        (None, None) => None,
    }
}

fn new_position(
    current_snapshot: &AggregatedSnapshot,
    previous: Option<&Position>,
    current: &Position,
    materiality_threshold: f64,
) -> Option<ChangeEvent> {
    if current.value < materiality_threshold {
        return None;
    }
    let previous_shares = previous.map_or(0.0, |position| position.shares);
    let previous_value = previous.map_or(0.0, |position| position.value);

    Some(event(
        current_snapshot,
        current,
        ChangeClassification::NewPosition,
        None,
        (previous_shares, current.shares),
        (previous_value, current.value),
        None,
    ))
}

fn event(
    current_snapshot: &AggregatedSnapshot,
    position: &Position,
    classification: ChangeClassification,
    conviction: Option<Conviction>,
    (previous_shares, current_shares): (f64, f64),
    (previous_value, current_value): (f64, f64),
    percent_change: Option<f64>,
) -> ChangeEvent {
    ChangeEvent {
        entity_id: current_snapshot.entity_id.clone(),
        security_id: position.security_id.clone(),
        ticker: position.ticker.clone(),
        name: position.name.clone(),
        as_of_date: current_snapshot.as_of_date,
        classification,
        conviction,
        instrument_kind: position.instrument_kind,
        previous_shares,
        current_shares,
        previous_value,
        current_value,
        delta_shares: current_shares - previous_shares,
        delta_value: current_value - previous_value,
        percent_change,
    }
}

fn by_magnitude(left: &ChangeEvent, right: &ChangeEvent) -> Ordering {
    right
        .delta_value
        .abs()
        .total_cmp(&left.delta_value.abs())
        .then_with(|| left.security_id.cmp(&right.security_id))
        .then_with(|| left.instrument_kind.cmp(&right.instrument_kind))
}

fn summarize(events: &[ChangeEvent], previous_total: f64, current_total: f64) -> DiffSummary {
    let mut summary = DiffSummary {
        previous_total,
        current_total,
        total_value_change: current_total - previous_total,
        ..DiffSummary::default()
    };

    for event in events {
        match event.classification {
            ChangeClassification::NewPosition => summary.new_positions += 1,
            ChangeClassification::Increased => summary.increased += 1,
            ChangeClassification::Decreased => summary.decreased += 1,
            ChangeClassification::SoldOut => summary.sold_out += 1,
        }
        if event.is_strong() {
            summary.strong_moves += 1;
        }
    }

    summary
}
