use thiserror::Error;

use crate::domain::{DisclosureDate, EntityId};

/// Validation and contract errors exposed by `filingscope-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("entity id cannot be empty")]
    EmptyEntityId,
    #[error("entity id length {len} exceeds max {max}")]
    EntityIdTooLong { len: usize, max: usize },
    #[error("entity id contains invalid character '{ch}' at index {index}")]
    EntityIdInvalidChar { ch: char, index: usize },

    #[error("security id cannot be empty")]
    EmptySecurityId,
    #[error("security id length {len} exceeds max {max}")]
    SecurityIdTooLong { len: usize, max: usize },

    #[error("invalid entity kind '{value}', expected one of individual, fund")]
    InvalidEntityKind { value: String },
    #[error("invalid instrument kind '{value}', expected one of EQUITY, CALL, PUT, OTHER")]
    InvalidInstrumentKind { value: String },

    #[error("disclosure date must be YYYY-MM-DD: '{value}'")]
    InvalidDate { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("field '{field}' must be greater than zero")]
    ZeroValue { field: &'static str },
    #[error("strong threshold {strong}% must be >= significance threshold {significance}%")]
    StrongBelowSignificance { strong: f64, significance: f64 },

    #[error("cannot diff snapshots of different entities ('{previous}' vs '{current}')")]
    EntityMismatch { previous: String, current: String },
    #[error("previous snapshot ({previous}) must be dated before current snapshot ({current})")]
    SnapshotsNotAscending { previous: String, current: String },

    #[error("request_id must be at least 8 characters")]
    InvalidRequestId,
    #[error("schema_version must match vMAJOR.MINOR.PATCH: '{value}'")]
    InvalidSchemaVersion { value: String },

    #[error("error code cannot be empty")]
    EmptyErrorCode,
    #[error("error message cannot be empty")]
    EmptyErrorMessage,
    #[error("error references entity '{entity_id}' that the envelope does not cover")]
    UncoveredErrorEntity { entity_id: String },
}

/// Failures raised by snapshot stores and dataset loaders.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entity '{0}' is not known to the snapshot store")]
    NotFound(EntityId),

    #[error("snapshot for '{entity_id}' dated {date} is not after the latest snapshot ({latest})")]
    OutOfOrder {
        entity_id: EntityId,
        date: DisclosureDate,
        latest: DisclosureDate,
    },

    #[error("snapshot references unknown entity '{0}'")]
    UnknownEntity(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("dataset parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
