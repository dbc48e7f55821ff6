//! Per-entity portfolio metrics: concentration and value history.

use serde::{Deserialize, Serialize};

use crate::aggregator::AggregatedSnapshot;
use crate::domain::{DisclosureDate, EntityId};

/// Coarse concentration bucket derived from the Herfindahl index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationTier {
    High,
    Medium,
    Low,
}

impl ConcentrationTier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn from_herfindahl(index: f64) -> Self {
        if index > 0.2 {
            Self::High
        } else if index > 0.1 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concentration {
    pub entity_id: EntityId,
    pub as_of_date: DisclosureDate,
    pub position_count: usize,
    pub total_value: f64,
    pub average_position_size: f64,
    /// Σ weight², between `1 / position_count` and 1.
    pub herfindahl: f64,
    pub top3_weight_pct: f64,
    pub top10_weight_pct: f64,
    pub tier: ConcentrationTier,
}

/// Concentration metrics of one snapshot's non-option positions; `None`
/// when they hold no value.
pub fn concentration(snapshot: &AggregatedSnapshot) -> Option<Concentration> {
    let mut values = snapshot
        .non_option_positions()
        .map(|position| position.value)
        .collect::<Vec<_>>();
    let total_value: f64 = values.iter().sum();
    if values.is_empty() || total_value <= 0.0 {
        return None;
    }

    values.sort_by(|left, right| right.total_cmp(left));
    let herfindahl = values
        .iter()
        .map(|value| {
            let weight = value / total_value;
            weight * weight
        })
        .sum();
    let top_weight = |count: usize| values.iter().take(count).sum::<f64>() * 100.0 / total_value;

    Some(Concentration {
        entity_id: snapshot.entity_id.clone(),
        as_of_date: snapshot.as_of_date,
        position_count: values.len(),
        total_value,
        average_position_size: total_value / values.len() as f64,
        herfindahl,
        top3_weight_pct: top_weight(3),
        top10_weight_pct: top_weight(10),
        tier: ConcentrationTier::from_herfindahl(herfindahl),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePoint {
    pub as_of_date: DisclosureDate,
    pub total_value: f64,
    /// Change against the preceding snapshot, in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_return_pct: Option<f64>,
}

/// Reported portfolio value of the last `periods` snapshots, oldest first.
///
/// The first point never has a return; a point after a zero-valued snapshot
/// has none either.
pub fn value_history(snapshots: &[AggregatedSnapshot], periods: usize) -> Vec<ValuePoint> {
    let start = snapshots.len().saturating_sub(periods);
    let recent = &snapshots[start..];

    let mut points = Vec::with_capacity(recent.len());
    let mut previous_total: Option<f64> = None;
    for snapshot in recent {
        let total_value = snapshot.reported_total();
        let period_return_pct = previous_total
            .filter(|previous| *previous > 0.0)
            .map(|previous| (total_value - previous) * 100.0 / previous);
        points.push(ValuePoint {
            as_of_date: snapshot.as_of_date,
            total_value,
            period_return_pct,
        });
        previous_total = Some(total_value);
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InstrumentKind, Position, SecurityId};

    fn snapshot(date: &str, values: &[f64]) -> AggregatedSnapshot {
        let positions = values.iter().enumerate().map(|(index, value)| {
            Position::new(
                SecurityId::parse(&format!("SEC{index:03}")).expect("valid id"),
                format!("SECURITY {index}"),
                None,
                InstrumentKind::Equity,
                1.0,
                *value,
            )
            .expect("valid position")
        });
        AggregatedSnapshot::new(
            EntityId::parse("gates").expect("valid id"),
            DisclosureDate::parse(date).expect("valid date"),
            positions,
        )
    }

    #[test]
    fn single_position_is_fully_concentrated() {
        let metrics = concentration(&snapshot("2024-03-31", &[500.0])).expect("metrics");
        assert_eq!(metrics.herfindahl, 1.0);
        assert_eq!(metrics.top3_weight_pct, 100.0);
        assert_eq!(metrics.tier, ConcentrationTier::High);
    }

    #[test]
    fn equal_weights_give_inverse_count() {
        let metrics =
            concentration(&snapshot("2024-03-31", &[25.0, 25.0, 25.0, 25.0])).expect("metrics");
        assert!((metrics.herfindahl - 0.25).abs() < 1e-12);
        assert!((metrics.top3_weight_pct - 75.0).abs() < 1e-12);
        assert_eq!(metrics.average_position_size, 25.0);
    }

    #[test]
    fn empty_snapshot_has_no_concentration() {
        assert!(concentration(&snapshot("2024-03-31", &[])).is_none());
        assert!(concentration(&snapshot("2024-03-31", &[0.0])).is_none());
    }

    #[test]
    fn option_lines_do_not_count_toward_concentration() {
        let id = SecurityId::parse("SEC000").expect("valid id");
        let put = Position::new(id, "SECURITY 0 PUT", None, InstrumentKind::Put, 1.0, 900.0)
            .expect("valid position");
        let base = snapshot("2024-03-31", &[50.0, 50.0]);
        let with_put = AggregatedSnapshot::new(
            base.entity_id.clone(),
            base.as_of_date,
            base.positions().cloned().chain(std::iter::once(put)),
        );

        let metrics = concentration(&with_put).expect("metrics");
        assert_eq!(metrics.position_count, 2);
        assert_eq!(metrics.total_value, 100.0);
        assert!((metrics.herfindahl - 0.5).abs() < 1e-12);
    }

    #[test]
    fn value_history_computes_period_returns() {
        let snapshots = vec![
            snapshot("2023-12-31", &[50.0]),
            snapshot("2024-03-31", &[100.0]),
            snapshot("2024-06-30", &[110.0]),
        ];

        let history = value_history(&snapshots, 2);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].period_return_pct, None);
        let second = history[1].period_return_pct.expect("return");
        assert!((second - 10.0).abs() < 1e-12);
    }
}
