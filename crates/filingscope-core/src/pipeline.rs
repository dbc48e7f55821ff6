//! Batch orchestration: store → aggregator → diff per entity on the rayon
//! pool, then one trend reduction after every entity has finished.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aggregator::{aggregate, AggregatedSnapshot, Anomaly};
use crate::config::EngineConfig;
use crate::diff::{diff_snapshots, DiffReport};
use crate::domain::{EntityId, Snapshot};
use crate::resolver::{SectorClassifier, SecurityResolver};
use crate::store::SnapshotStore;
use crate::trends::{aggregate_trends, EntityWindow, TrendReport};
use crate::{CoreError, StoreError};

/// Why an entity produced no diffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Store,
    Ordering,
    Validation,
}

impl FailureKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Store => "store_error",
            Self::Ordering => "snapshot_ordering",
            Self::Validation => "validation_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFailure {
    pub entity_id: EntityId,
    pub kind: FailureKind,
    pub message: String,
}

/// Result of one batch run. Entity-level problems land in `skipped` and
/// `failures`; they never abort the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Every diff, ordered by entity id then date.
    pub diffs: Vec<DiffReport>,
    pub trends: TrendReport,
    pub anomalies: Vec<Anomaly>,
    /// Entities with fewer than two snapshots.
    pub skipped: Vec<EntityId>,
    pub failures: Vec<EntityFailure>,
}

impl PipelineReport {
    /// Every entity the run reached: diffed, skipped, or failed. Ascending.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids = self
            .diffs
            .iter()
            .map(|diff| diff.entity_id.clone())
            .chain(self.skipped.iter().cloned())
            .chain(self.failures.iter().map(|failure| failure.entity_id.clone()))
            .collect::<Vec<_>>();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Aggregated, resolved snapshots of one entity, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityHistory {
    pub entity_id: EntityId,
    pub snapshots: Vec<AggregatedSnapshot>,
    pub anomalies: Vec<Anomaly>,
}

enum EntityOutcome {
    Window(EntityWindow, Vec<Anomaly>),
    Skipped(EntityId, Vec<Anomaly>),
    Failed(EntityFailure),
}

pub struct Pipeline<'a> {
    store: &'a dyn SnapshotStore,
    resolver: &'a dyn SecurityResolver,
    classifier: &'a dyn SectorClassifier,
    config: &'a EngineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        store: &'a dyn SnapshotStore,
        resolver: &'a dyn SecurityResolver,
        classifier: &'a dyn SectorClassifier,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            classifier,
            config,
        }
    }

    /// Run every entity in the store and reduce the results into trends.
    ///
    /// Only a failure to list entities, or an invalid config, is fatal.
    pub fn run(&self) -> Result<PipelineReport, CoreError> {
        self.config.validate()?;
        let entities = self.store.entities()?;
        tracing::info!(entities = entities.len(), "starting pipeline run");

        let mut outcomes = entities
            .par_iter()
            .map(|entity| self.process_entity(&entity.id))
            .collect::<Vec<_>>();
        outcomes.sort_by(|left, right| outcome_entity(left).cmp(outcome_entity(right)));

        let mut windows = Vec::new();
        let mut anomalies = Vec::new();
        let mut skipped = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                EntityOutcome::Window(window, found) => {
                    anomalies.extend(found);
                    windows.push(window);
                }
                EntityOutcome::Skipped(entity_id, found) => {
                    anomalies.extend(found);
                    skipped.push(entity_id);
                }
                EntityOutcome::Failed(failure) => failures.push(failure),
            }
        }

        let trends = aggregate_trends(&windows, self.classifier, self.config);
        let diffs = windows
            .into_iter()
            .flat_map(|window| window.diffs)
            .collect::<Vec<_>>();

        tracing::info!(
            diffs = diffs.len(),
            skipped = skipped.len(),
            failures = failures.len(),
            anomalies = anomalies.len(),
            "pipeline run complete"
        );

        Ok(PipelineReport {
            diffs,
            trends,
            anomalies,
            skipped,
            failures,
        })
    }

    /// Aggregate and resolve the last `periods` snapshots of one entity.
    pub fn history(&self, entity_id: &EntityId, periods: usize) -> Result<EntityHistory, CoreError> {
        let snapshots = self.store.get_snapshots(entity_id)?;
        check_ordering(entity_id, &snapshots)?;
        let start = snapshots.len().saturating_sub(periods);
        let (snapshots, anomalies) = self.aggregate_all(&snapshots[start..]);
        Ok(EntityHistory {
            entity_id: entity_id.clone(),
            snapshots,
            anomalies,
        })
    }

    fn process_entity(&self, entity_id: &EntityId) -> EntityOutcome {
        let snapshots = match self.store.get_snapshots(entity_id) {
            Ok(snapshots) => snapshots,
            Err(error) => {
                tracing::warn!(entity = %entity_id, %error, "snapshot lookup failed");
                return EntityOutcome::Failed(EntityFailure {
                    entity_id: entity_id.clone(),
                    kind: FailureKind::Store,
                    message: error.to_string(),
                });
            }
        };
        if let Err(error) = check_ordering(entity_id, &snapshots) {
            tracing::warn!(entity = %entity_id, %error, "snapshots out of order");
            return EntityOutcome::Failed(EntityFailure {
                entity_id: entity_id.clone(),
                kind: FailureKind::Ordering,
                message: error.to_string(),
            });
        }

        let start = snapshots
            .len()
            .saturating_sub(self.config.snapshots_needed());
        let (aggregated, anomalies) = self.aggregate_all(&snapshots[start..]);
        if aggregated.len() < 2 {
            tracing::debug!(entity = %entity_id, snapshots = aggregated.len(), "not enough history");
            return EntityOutcome::Skipped(entity_id.clone(), anomalies);
        }

        let mut diffs = Vec::with_capacity(aggregated.len() - 1);
        for pair in aggregated.windows(2) {
            match diff_snapshots(&pair[0], &pair[1], self.config) {
                Ok(diff) => diffs.push(diff),
                Err(error) => {
                    return EntityOutcome::Failed(EntityFailure {
                        entity_id: entity_id.clone(),
                        kind: FailureKind::Validation,
                        message: error.to_string(),
                    });
                }
            }
        }

        let mut latest = aggregated.into_iter().rev();
        match (latest.next(), latest.next()) {
            (Some(current), Some(previous)) => EntityOutcome::Window(
                EntityWindow {
                    entity_id: entity_id.clone(),
                    diffs,
                    previous,
                    current,
                },
                anomalies,
            ),
            _ => EntityOutcome::Skipped(entity_id.clone(), anomalies),
        }
    }

    fn aggregate_all(&self, snapshots: &[Snapshot]) -> (Vec<AggregatedSnapshot>, Vec<Anomaly>) {
        let mut anomalies = Vec::new();
        let aggregated = snapshots
            .iter()
            .map(|snapshot| {
                let aggregation = aggregate(snapshot);
                anomalies.extend(aggregation.anomalies);
                aggregation.snapshot.with_resolved(self.resolver)
            })
            .collect();
        (aggregated, anomalies)
    }
}

fn check_ordering(entity_id: &EntityId, snapshots: &[Snapshot]) -> Result<(), StoreError> {
    for snapshot in snapshots {
        if &snapshot.entity_id != entity_id {
            return Err(StoreError::UnknownEntity(snapshot.entity_id.to_string()));
        }
    }
    for pair in snapshots.windows(2) {
        if pair[1].as_of_date <= pair[0].as_of_date {
            return Err(StoreError::OutOfOrder {
                entity_id: entity_id.clone(),
                date: pair[1].as_of_date,
                latest: pair[0].as_of_date,
            });
        }
    }
    Ok(())
}

fn outcome_entity(outcome: &EntityOutcome) -> &EntityId {
    match outcome {
        EntityOutcome::Window(window, _) => &window.entity_id,
        EntityOutcome::Skipped(entity_id, _) => entity_id,
        EntityOutcome::Failed(failure) => &failure.entity_id,
    }
}
