//! Snapshot store seam plus an in-memory, append-only implementation and a
//! JSON dataset loader.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aggregator::{Anomaly, AnomalyKind};
use crate::domain::{
    number_from_value, DisclosureDate, Entity, EntityId, RawPosition, SecurityId, Snapshot,
};
use crate::resolver::{Resolution, StaticSecurityResolver, StaticSectorClassifier};
use crate::StoreError;

/// Read-only source of per-entity disclosure snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Every tracked entity, in ascending id order.
    fn entities(&self) -> Result<Vec<Entity>, StoreError>;

    /// Snapshots of one entity in strictly ascending `as_of_date` order.
    fn get_snapshots(&self, entity_id: &EntityId) -> Result<Vec<Snapshot>, StoreError>;
}

/// Append-only in-memory store.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotStore {
    entities: BTreeMap<EntityId, Entity>,
    snapshots: BTreeMap<EntityId, Vec<Snapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or rename an entity. Existing snapshots are kept.
    pub fn register(&mut self, entity: Entity) {
        self.snapshots.entry(entity.id.clone()).or_default();
        self.entities.insert(entity.id.clone(), entity);
    }

    /// Append a snapshot; it must be dated after the entity's latest one.
    pub fn append(&mut self, snapshot: Snapshot) -> Result<(), StoreError> {
        if !self.entities.contains_key(&snapshot.entity_id) {
            return Err(StoreError::UnknownEntity(snapshot.entity_id.to_string()));
        }

        let history = self.snapshots.entry(snapshot.entity_id.clone()).or_default();
        if let Some(latest) = history.last() {
            if snapshot.as_of_date <= latest.as_of_date {
                return Err(StoreError::OutOfOrder {
                    entity_id: snapshot.entity_id.clone(),
                    date: snapshot.as_of_date,
                    latest: latest.as_of_date,
                });
            }
        }

        history.push(snapshot);
        Ok(())
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.values().map(Vec::len).sum()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn entities(&self) -> Result<Vec<Entity>, StoreError> {
        Ok(self.entities.values().cloned().collect())
    }

    fn get_snapshots(&self, entity_id: &EntityId) -> Result<Vec<Snapshot>, StoreError> {
        self.snapshots
            .get(entity_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(entity_id.clone()))
    }
}

#[derive(Debug, Deserialize)]
struct DatasetFile {
    #[serde(default)]
    entities: Vec<Entity>,
    #[serde(default)]
    snapshots: Vec<SnapshotRecord>,
    #[serde(default)]
    securities: HashMap<String, Resolution>,
    #[serde(default)]
    sectors: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    entity_id: String,
    #[serde(default)]
    as_of_date: Option<String>,
    #[serde(default)]
    positions: Vec<RawPosition>,
    #[serde(default)]
    total_value: Option<Value>,
}

/// Everything a JSON dataset file provides: the store and both lookups.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub store: InMemorySnapshotStore,
    pub resolver: StaticSecurityResolver,
    pub classifier: StaticSectorClassifier,
    /// Snapshot-level problems found while loading.
    pub anomalies: Vec<Anomaly>,
}

impl Dataset {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let dataset = Self::from_json_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            entities = dataset.store.entities.len(),
            snapshots = dataset.store.snapshot_count(),
            anomalies = dataset.anomalies.len(),
            "loaded dataset"
        );
        Ok(dataset)
    }

    /// Parse a dataset. Snapshots with a missing or invalid date, an unknown
    /// entity, or a date already taken are dropped and reported as anomalies.
    /// An unusable `total_value` is reported too, but the snapshot is kept
    /// and falls back to the sum of its positions.
    pub fn from_json_str(input: &str) -> Result<Self, StoreError> {
        let file: DatasetFile = serde_json::from_str(input)?;

        let mut store = InMemorySnapshotStore::new();
        for entity in file.entities {
            store.register(entity);
        }

        let mut anomalies = Vec::new();
        let mut accepted = Vec::with_capacity(file.snapshots.len());
        for (row, record) in file.snapshots.into_iter().enumerate() {
            match parse_record(&store, record) {
                Ok((snapshot, total_ok)) => {
                    if !total_ok {
                        anomalies.push(Anomaly {
                            entity_id: Some(snapshot.entity_id.clone()),
                            as_of_date: Some(snapshot.as_of_date),
                            row,
                            kind: AnomalyKind::InvalidTotalValue,
                        });
                    }
                    accepted.push((row, snapshot));
                }
                Err((entity_id, kind)) => anomalies.push(Anomaly {
                    entity_id,
                    as_of_date: None,
                    row,
                    kind,
                }),
            }
        }

        accepted.sort_by(|(_, left), (_, right)| {
            left.entity_id
                .cmp(&right.entity_id)
                .then_with(|| left.as_of_date.cmp(&right.as_of_date))
        });
        for (row, snapshot) in accepted {
            let entity_id = snapshot.entity_id.clone();
            let as_of_date = snapshot.as_of_date;
            if let Err(error) = store.append(snapshot) {
                tracing::warn!(entity = %entity_id, %error, "dropping snapshot");
                anomalies.push(Anomaly {
                    entity_id: Some(entity_id),
                    as_of_date: Some(as_of_date),
                    row,
                    kind: AnomalyKind::DuplicateDate,
                });
            }
        }
        anomalies.sort_by_key(|anomaly| anomaly.row);

        let securities = file
            .securities
            .into_iter()
            .filter_map(|(id, resolution)| match SecurityId::parse(&id) {
                Ok(id) => Some((id, resolution)),
                Err(error) => {
                    tracing::warn!(security = %id, %error, "skipping security reference");
                    None
                }
            })
            .collect();

        Ok(Self {
            store,
            resolver: StaticSecurityResolver::new(securities),
            classifier: StaticSectorClassifier::new(file.sectors),
            anomalies,
        })
    }
}

/// The flag is `false` when a `total_value` was given but was not a usable
/// non-negative number.
fn parse_record(
    store: &InMemorySnapshotStore,
    record: SnapshotRecord,
) -> Result<(Snapshot, bool), (Option<EntityId>, AnomalyKind)> {
    let entity_id =
        EntityId::parse(&record.entity_id).map_err(|_| (None, AnomalyKind::InvalidEntity))?;
    if !store.entities.contains_key(&entity_id) {
        return Err((Some(entity_id), AnomalyKind::UnknownEntity));
    }

    let as_of_date = match record.as_of_date.as_deref().map(str::trim) {
        None | Some("") => return Err((Some(entity_id), AnomalyKind::MissingDate)),
        Some(raw) => match DisclosureDate::parse(raw) {
            Ok(date) => date,
            Err(_) => return Err((Some(entity_id), AnomalyKind::InvalidDate)),
        },
    };

    let total_value = record.total_value.as_ref().map(|raw| {
        number_from_value(raw).filter(|total| total.is_finite() && *total >= 0.0)
    });

    let mut snapshot = Snapshot::new(entity_id, as_of_date, record.positions);
    snapshot.total_value = total_value.flatten();
    Ok((snapshot, !matches!(total_value, Some(None))))
}
