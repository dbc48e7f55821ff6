use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// What a trend signal is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalScope {
    Security,
    Sector,
}

impl SignalScope {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Sector => "sector",
        }
    }
}

impl Display for SignalScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction the buy/sell split of a signal leans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consensus {
    Bullish,
    Bearish,
    Mixed,
}

impl Consensus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Mixed => "mixed",
        }
    }

    /// One side has to outnumber the other more than two to one.
    pub fn from_counts(buyers: usize, sellers: usize) -> Self {
        if buyers > sellers * 2 {
            Self::Bullish
        } else if sellers > buyers * 2 {
            Self::Bearish
        } else {
            Self::Mixed
        }
    }
}

/// Cross-sectional signal keyed by security or sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSignal {
    pub scope: SignalScope,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub buyer_count: usize,
    pub seller_count: usize,
    pub net_dollar_flow: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_change: Option<f64>,
    pub consensus: Consensus,
    /// 1-based position within its ranking.
    pub rank: usize,
}
