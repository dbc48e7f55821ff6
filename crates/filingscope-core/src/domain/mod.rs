//! # Domain Models
//!
//! Canonical disclosure types shared by the aggregator, diff engine, and
//! trend aggregator.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Entity`] | Tracked investor or fund |
//! | [`Snapshot`] | Dated set of raw disclosed rows for one entity |
//! | [`RawPosition`] | Unvalidated disclosed row |
//! | [`Position`] | Canonical holding per security and instrument kind |
//! | [`PositionKey`] | Security id plus instrument kind |
//! | [`ChangeEvent`] | Classified change between two snapshots |
//! | [`TrendSignal`] | Cross-entity signal keyed by security or sector |
//! | [`DisclosureDate`] | `YYYY-MM-DD` as-of date |
//!
//! Identifiers ([`EntityId`], [`SecurityId`]) validate on construction, so
//! an invalid id never reaches the engines.

mod change;
mod date;
mod entity;
mod security;
mod signal;
mod snapshot;

pub use change::{ChangeClassification, ChangeEvent, Conviction};
pub use date::DisclosureDate;
pub use entity::{Entity, EntityId, EntityKind};
pub(crate) use security::validate_non_negative;
pub use security::{normalize_ticker, InstrumentKind, Position, PositionKey, SecurityId};
pub use signal::{Consensus, SignalScope, TrendSignal};
pub(crate) use snapshot::number_from_value;
pub use snapshot::{RawPosition, Snapshot};
