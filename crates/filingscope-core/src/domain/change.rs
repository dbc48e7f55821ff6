use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::domain::{DisclosureDate, EntityId, InstrumentKind, SecurityId};

/// What happened to one security between two consecutive disclosures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeClassification {
    NewPosition,
    Increased,
    Decreased,
    SoldOut,
}

impl ChangeClassification {
    pub const ALL: [Self; 4] = [
        Self::NewPosition,
        Self::Increased,
        Self::Decreased,
        Self::SoldOut,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewPosition => "new_position",
            Self::Increased => "increased",
            Self::Decreased => "decreased",
            Self::SoldOut => "sold_out",
        }
    }

    /// New positions and increases both add exposure.
    pub const fn is_buy_side(self) -> bool {
        matches!(self, Self::NewPosition | Self::Increased)
    }

    pub const fn is_sell_side(self) -> bool {
        matches!(self, Self::Decreased | Self::SoldOut)
    }
}

impl Display for ChangeClassification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strong-conviction sub-tag for increases/decreases past the strong threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conviction {
    Buy,
    Sell,
}

impl Conviction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

/// Classified change of one security for one entity.
///
/// Percentages keep full precision; rounding belongs to whoever renders them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity_id: EntityId,
    pub security_id: SecurityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    pub name: String,
    pub as_of_date: DisclosureDate,
    pub classification: ChangeClassification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conviction: Option<Conviction>,
    pub instrument_kind: InstrumentKind,
    pub previous_shares: f64,
    pub current_shares: f64,
    pub previous_value: f64,
    pub current_value: f64,
    pub delta_shares: f64,
    pub delta_value: f64,
    /// `None` when the previous share count is zero (no defined base).
    pub percent_change: Option<f64>,
}

impl ChangeEvent {
    /// Ticker if known, otherwise the security id.
    pub fn label(&self) -> &str {
        self.ticker
            .as_deref()
            .unwrap_or_else(|| self.security_id.as_str())
    }

    pub fn is_strong(&self) -> bool {
        self.conviction.is_some()
    }
}
