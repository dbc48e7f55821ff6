//! Core engine for filingscope.
//!
//! This crate contains:
//! - Canonical domain models and validation (entities, securities, snapshots)
//! - Position aggregation with anomaly reporting
//! - The snapshot diff engine and cross-entity trend aggregation
//! - Portfolio profile metrics
//! - Snapshot store and lookup seams, plus a JSON dataset loader
//! - The parallel batch pipeline and the response envelope

pub mod aggregator;
pub mod config;
pub mod diff;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod pipeline;
pub mod profile;
pub mod resolver;
pub mod store;
pub mod trends;

pub use aggregator::{aggregate, AggregatedSnapshot, Aggregation, Anomaly, AnomalyKind};
pub use config::EngineConfig;
pub use diff::{diff_snapshots, DiffReport, DiffSummary};
pub use domain::{
    normalize_ticker, ChangeClassification, ChangeEvent, Consensus, Conviction, DisclosureDate,
    Entity, EntityId, EntityKind, InstrumentKind, Position, PositionKey, RawPosition, SecurityId,
    SignalScope, Snapshot, TrendSignal,
};
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta};
pub use error::{CoreError, StoreError, ValidationError};
pub use pipeline::{EntityFailure, EntityHistory, FailureKind, Pipeline, PipelineReport};
pub use profile::{concentration, value_history, Concentration, ConcentrationTier, ValuePoint};
pub use resolver::{
    NoopResolver, Resolution, SectorClassifier, SecurityResolver, StaticSectorClassifier,
    StaticSecurityResolver, UNKNOWN_SECTOR,
};
pub use store::{Dataset, InMemorySnapshotStore, SnapshotStore};
pub use trends::{
    aggregate_trends, large_new_positions, most_bought, sector_net_flows, sector_rotation,
    sentiment_index, CapitalStance, EntityWindow, SectorFlow, SectorFlows, SentimentReading,
    TrendReport,
};
