//! Injected lookup capabilities: security → ticker/name, and ticker → sector.
//!
//! The engines never hardcode lookup tables; callers pass implementations of
//! these traits, which must be pure and cheap because they are called from
//! rayon worker threads.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{normalize_ticker, SecurityId};

/// Sector bucket for anything the classifier cannot place.
pub const UNKNOWN_SECTOR: &str = "Unknown";

/// Best-effort identity of a security. Both fields empty means unresolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Resolution {
    pub fn unresolved() -> Self {
        Self::default()
    }

    pub fn is_resolved(&self) -> bool {
        self.ticker.is_some() || self.display_name.is_some()
    }
}

/// Maps a security id to its ticker and display name.
pub trait SecurityResolver: Send + Sync {
    fn resolve(&self, security_id: &SecurityId) -> Resolution;
}

/// Maps a ticker to a sector label, [`UNKNOWN_SECTOR`] when unmapped.
pub trait SectorClassifier: Send + Sync {
    fn classify(&self, ticker: &str) -> String;
}

/// Resolver that never resolves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

impl SecurityResolver for NoopResolver {
    fn resolve(&self, _security_id: &SecurityId) -> Resolution {
        Resolution::unresolved()
    }
}

impl SectorClassifier for NoopResolver {
    fn classify(&self, _ticker: &str) -> String {
        String::from(UNKNOWN_SECTOR)
    }
}

/// Map-backed [`SecurityResolver`].
#[derive(Debug, Clone, Default)]
pub struct StaticSecurityResolver {
    entries: HashMap<SecurityId, Resolution>,
}

impl StaticSecurityResolver {
    pub fn new(entries: HashMap<SecurityId, Resolution>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(id, resolution)| {
                let ticker = normalize_ticker(resolution.ticker.as_deref());
                (
                    id,
                    Resolution {
                        ticker,
                        display_name: resolution.display_name,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn with_entry(mut self, security_id: SecurityId, resolution: Resolution) -> Self {
        self.entries.insert(
            security_id,
            Resolution {
                ticker: normalize_ticker(resolution.ticker.as_deref()),
                display_name: resolution.display_name,
            },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SecurityResolver for StaticSecurityResolver {
    fn resolve(&self, security_id: &SecurityId) -> Resolution {
        self.entries.get(security_id).cloned().unwrap_or_default()
    }
}

/// Map-backed [`SectorClassifier`]; lookups are case-insensitive on the ticker.
#[derive(Debug, Clone, Default)]
pub struct StaticSectorClassifier {
    sectors: HashMap<String, String>,
}

impl StaticSectorClassifier {
    pub fn new(sectors: HashMap<String, String>) -> Self {
        let sectors = sectors
            .into_iter()
            .filter_map(|(ticker, sector)| {
                let ticker = normalize_ticker(Some(&ticker))?;
                let sector = sector.trim();
                (!sector.is_empty()).then(|| (ticker, sector.to_owned()))
            })
            .collect();
        Self { sectors }
    }

    pub fn with_sector(mut self, ticker: &str, sector: &str) -> Self {
        if let Some(ticker) = normalize_ticker(Some(ticker)) {
            self.sectors.insert(ticker, sector.trim().to_owned());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }
}

impl SectorClassifier for StaticSectorClassifier {
    fn classify(&self, ticker: &str) -> String {
        normalize_ticker(Some(ticker))
            .and_then(|ticker| self.sectors.get(&ticker).cloned())
            .unwrap_or_else(|| String::from(UNKNOWN_SECTOR))
    }
}
