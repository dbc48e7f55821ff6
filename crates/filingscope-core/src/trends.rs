//! Trend aggregation: reduces many entities' diffs into cross-sectional signals.
//!
//! Every function here is a pure reduction over a completed set of
//! [`EntityWindow`]s; nothing is streamed, so rankings never depend on the
//! order in which per-entity work finished. Only equity events take part,
//! option events stay in their own per-entity list.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::aggregator::AggregatedSnapshot;
use crate::config::EngineConfig;
use crate::diff::DiffReport;
use crate::domain::{
    ChangeClassification, ChangeEvent, Consensus, DisclosureDate, EntityId, SignalScope,
    TrendSignal,
};
use crate::resolver::{SectorClassifier, UNKNOWN_SECTOR};

/// One entity's contribution to a trend window: the diffs of its most recent
/// transitions (oldest first) and the latest aggregated pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityWindow {
    pub entity_id: EntityId,
    pub diffs: Vec<DiffReport>,
    pub previous: AggregatedSnapshot,
    pub current: AggregatedSnapshot,
}

impl EntityWindow {
    /// All equity events across the window.
    pub fn events(&self) -> impl Iterator<Item = &ChangeEvent> {
        self.diffs.iter().flat_map(|diff| diff.events.iter())
    }
}

/// Heuristic reading of whether an entity put money to work or pulled it back.
///
/// Disclosures do not report cash, so a shrinking portfolio may as well be a
/// market drawdown. Treat the stance as a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapitalStance {
    DeployingCapital,
    RaisingCash,
    Flat,
    Undetermined,
}

impl CapitalStance {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DeployingCapital => "deploying_capital",
            Self::RaisingCash => "raising_cash",
            Self::Flat => "flat",
            Self::Undetermined => "undetermined",
        }
    }
}

/// Sentiment index of one entity over its latest transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReading {
    pub entity_id: EntityId,
    pub previous_date: DisclosureDate,
    pub current_date: DisclosureDate,
    pub previous_total: f64,
    pub current_total: f64,
    /// `(current − previous) / previous`; `None` when the previous total is zero.
    pub ratio: Option<f64>,
    pub stance: CapitalStance,
}

/// Net event flow into or out of one sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorFlow {
    pub sector: String,
    pub net_flow: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorFlows {
    /// Largest inflow first.
    pub inflows: Vec<SectorFlow>,
    /// Largest outflow first.
    pub outflows: Vec<SectorFlow>,
}

/// Every cross-sectional signal for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub entities_considered: usize,
    pub most_bought: Vec<TrendSignal>,
    pub sector_rotation: Vec<TrendSignal>,
    pub sector_flows: SectorFlows,
    pub large_new_positions: Vec<ChangeEvent>,
    pub sentiment: Vec<SentimentReading>,
}

/// Compute every trend signal for `windows`.
pub fn aggregate_trends(
    windows: &[EntityWindow],
    classifier: &dyn SectorClassifier,
    config: &EngineConfig,
) -> TrendReport {
    let sentiment = ordered(windows)
        .into_iter()
        .map(|window| sentiment_index(&window.previous, &window.current))
        .collect();

    TrendReport {
        entities_considered: windows.len(),
        most_bought: most_bought(windows, config),
        sector_rotation: sector_rotation(windows, classifier),
        sector_flows: sector_net_flows(windows, classifier),
        large_new_positions: large_new_positions(windows, config),
        sentiment,
    }
}

#[derive(Default)]
struct SecurityTally {
    label: Option<String>,
    buyers: BTreeSet<EntityId>,
    sellers: BTreeSet<EntityId>,
    net_flow: f64,
}

/// Rank securities by how many distinct entities bought them in the window.
///
/// Ties on buyer count go to the larger net dollar flow, then to the
/// lexicographically smaller security id.
pub fn most_bought(windows: &[EntityWindow], config: &EngineConfig) -> Vec<TrendSignal> {
    let mut tallies: BTreeMap<String, SecurityTally> = BTreeMap::new();

    for window in ordered(windows) {
        for event in window.events() {
            let tally = tallies
                .entry(event.security_id.to_string())
                .or_default();
            if tally.label.is_none() {
                tally.label = event
                    .ticker
                    .clone()
                    .or_else(|| Some(event.name.clone()).filter(|name| !name.is_empty()));
            }
            if event.classification.is_buy_side() {
                tally.buyers.insert(event.entity_id.clone());
            }
            if event.classification.is_sell_side() {
                tally.sellers.insert(event.entity_id.clone());
            }
            tally.net_flow += event.delta_value;
        }
    }

    let mut signals = tallies
        .into_iter()
        .filter(|(_, tally)| tally.buyers.len() >= config.min_buyers)
        .map(|(key, tally)| TrendSignal {
            scope: SignalScope::Security,
            key,
            label: tally.label,
            buyer_count: tally.buyers.len(),
            seller_count: tally.sellers.len(),
            net_dollar_flow: tally.net_flow,
            percent_change: None,
            consensus: Consensus::from_counts(tally.buyers.len(), tally.sellers.len()),
            rank: 0,
        })
        .collect::<Vec<_>>();

    signals.sort_by(|left, right| {
        right
            .buyer_count
            .cmp(&left.buyer_count)
            .then_with(|| right.net_dollar_flow.total_cmp(&left.net_dollar_flow))
            .then_with(|| left.key.cmp(&right.key))
    });
    assign_ranks(&mut signals);
    signals
}

#[derive(Default)]
struct SectorTally {
    previous: f64,
    current: f64,
    growing: usize,
    shrinking: usize,
}

/// Per-sector change of aggregate holdings across every entity's latest pair.
///
/// Sectors with no previous holdings have no defined base and are skipped.
/// Unclassified holdings land in the `Unknown` sector and are ranked like
/// any other.
pub fn sector_rotation(
    windows: &[EntityWindow],
    classifier: &dyn SectorClassifier,
) -> Vec<TrendSignal> {
    let mut tallies: BTreeMap<String, SectorTally> = BTreeMap::new();

    for window in ordered(windows) {
        let previous = sector_values(&window.previous, classifier);
        let current = sector_values(&window.current, classifier);
        let sectors = previous.keys().chain(current.keys()).collect::<BTreeSet<_>>();

        for sector in sectors {
            let before = previous.get(sector).copied().unwrap_or(0.0);
            let after = current.get(sector).copied().unwrap_or(0.0);
            let tally = tallies.entry(sector.clone()).or_default();
            tally.previous += before;
            tally.current += after;
            if after > before {
                tally.growing += 1;
            } else if after < before {
                tally.shrinking += 1;
            }
        }
    }

    let mut signals = tallies
        .into_iter()
        .filter(|(_, tally)| tally.previous > 0.0)
        .map(|(sector, tally)| {
            let delta = tally.current - tally.previous;
            TrendSignal {
                scope: SignalScope::Sector,
                key: sector,
                label: None,
                buyer_count: tally.growing,
                seller_count: tally.shrinking,
                net_dollar_flow: delta,
                percent_change: Some(delta * 100.0 / tally.previous),
                consensus: Consensus::from_counts(tally.growing, tally.shrinking),
                rank: 0,
            }
        })
        .collect::<Vec<_>>();

    signals.sort_by(|left, right| {
        let left_pct = left.percent_change.unwrap_or_default().abs();
        let right_pct = right.percent_change.unwrap_or_default().abs();
        right_pct
            .total_cmp(&left_pct)
            .then_with(|| left.key.cmp(&right.key))
    });
    assign_ranks(&mut signals);
    signals
}

/// Sum of event value changes per sector over the whole window.
pub fn sector_net_flows(windows: &[EntityWindow], classifier: &dyn SectorClassifier) -> SectorFlows {
    let mut flows: BTreeMap<String, f64> = BTreeMap::new();
    for window in ordered(windows) {
        for event in window.events() {
            let sector = sector_of(event.ticker.as_deref(), classifier);
            *flows.entry(sector).or_default() += event.delta_value;
        }
    }

    let mut result = SectorFlows::default();
    for (sector, net_flow) in flows {
        if net_flow > 0.0 {
            result.inflows.push(SectorFlow { sector, net_flow });
        } else if net_flow < 0.0 {
            result.outflows.push(SectorFlow { sector, net_flow });
        }
    }
    result
        .inflows
        .sort_by(|left, right| right.net_flow.total_cmp(&left.net_flow));
    result
        .outflows
        .sort_by(|left, right| left.net_flow.total_cmp(&right.net_flow));
    result
}

/// The biggest new bets in the window: new positions at or above the large
/// position threshold, largest first, capped to the configured top-K.
pub fn large_new_positions(windows: &[EntityWindow], config: &EngineConfig) -> Vec<ChangeEvent> {
    let mut events = ordered(windows)
        .into_iter()
        .flat_map(|window| window.diffs.iter())
        .flat_map(|diff| diff.events_of(ChangeClassification::NewPosition))
        .filter(|event| event.current_value >= config.large_position_threshold)
        .cloned()
        .collect::<Vec<_>>();

    events.sort_by(|left, right| {
        right
            .current_value
            .total_cmp(&left.current_value)
            .then_with(|| left.entity_id.cmp(&right.entity_id))
            .then_with(|| left.security_id.cmp(&right.security_id))
    });
    events.truncate(config.large_position_top_k);
    events
}

/// Relative change of an entity's reported portfolio value between two snapshots.
pub fn sentiment_index(previous: &AggregatedSnapshot, current: &AggregatedSnapshot) -> SentimentReading {
    let previous_total = previous.reported_total();
    let current_total = current.reported_total();

    let ratio = (previous_total != 0.0).then(|| (current_total - previous_total) / previous_total);
    let stance = match ratio {
        None => CapitalStance::Undetermined,
        Some(ratio) if ratio > 0.0 => CapitalStance::DeployingCapital,
        Some(ratio) if ratio < 0.0 => CapitalStance::RaisingCash,
        Some(_) => CapitalStance::Flat,
    };

    SentimentReading {
        entity_id: current.entity_id.clone(),
        previous_date: previous.as_of_date,
        current_date: current.as_of_date,
        previous_total,
        current_total,
        ratio,
        stance,
    }
}

fn sector_values(
    snapshot: &AggregatedSnapshot,
    classifier: &dyn SectorClassifier,
) -> BTreeMap<String, f64> {
    let mut values = BTreeMap::new();
    for position in snapshot.non_option_positions() {
        let sector = sector_of(position.ticker.as_deref(), classifier);
        *values.entry(sector).or_default() += position.value;
    }
    values
}

fn sector_of(ticker: Option<&str>, classifier: &dyn SectorClassifier) -> String {
    match ticker {
        Some(ticker) => classifier.classify(ticker),
        None => String::from(UNKNOWN_SECTOR),
    }
}

fn ordered(windows: &[EntityWindow]) -> Vec<&EntityWindow> {
    let mut ordered = windows.iter().collect::<Vec<_>>();
    ordered.sort_by(|left, right| left.entity_id.cmp(&right.entity_id));
    ordered
}

fn assign_ranks(signals: &mut [TrendSignal]) {
    for (index, signal) in signals.iter_mut().enumerate() {
        signal.rank = index + 1;
    }
}
