use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_SECURITY_ID_LEN: usize = 32;

/// Canonical security identifier (a CUSIP in 13F filings), normalized to uppercase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecurityId(String);

impl SecurityId {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptySecurityId);
        }

        let len = trimmed.chars().count();
        if len > MAX_SECURITY_ID_LEN {
            return Err(ValidationError::SecurityIdTooLong {
                len,
                max: MAX_SECURITY_ID_LEN,
            });
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SecurityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for SecurityId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for SecurityId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SecurityId> for String {
    fn from(value: SecurityId) -> Self {
        value.0
    }
}

/// Instrument class of a disclosed line item.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstrumentKind {
    #[default]
    Equity,
    Call,
    Put,
    Other,
}

impl InstrumentKind {
    pub const ALL: [Self; 4] = [Self::Equity, Self::Call, Self::Put, Self::Other];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equity => "EQUITY",
            Self::Call => "CALL",
            Self::Put => "PUT",
            Self::Other => "OTHER",
        }
    }

    /// Option contracts are not comparable 1:1 with equity share counts.
    pub const fn is_option(self) -> bool {
        matches!(self, Self::Call | Self::Put)
    }
}

impl Display for InstrumentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstrumentKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "EQUITY" | "SH" => Ok(Self::Equity),
            "CALL" => Ok(Self::Call),
            "PUT" => Ok(Self::Put),
            "OTHER" | "PRN" => Ok(Self::Other),
            other => Err(ValidationError::InvalidInstrumentKind {
                value: other.to_owned(),
            }),
        }
    }
}

/// Identity of an aggregated holding.
///
/// 13F filings report stock and its CALL/PUT lines under the same CUSIP, so
/// the instrument kind is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    pub security_id: SecurityId,
    pub instrument_kind: InstrumentKind,
}

impl PositionKey {
    pub fn new(security_id: SecurityId, instrument_kind: InstrumentKind) -> Self {
        Self {
            security_id,
            instrument_kind,
        }
    }

    pub fn equity(security_id: SecurityId) -> Self {
        Self::new(security_id, InstrumentKind::Equity)
    }
}

impl Display for PositionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.instrument_kind {
            InstrumentKind::Equity => write!(f, "{}", self.security_id),
            kind => write!(f, "{}/{kind}", self.security_id),
        }
    }
}

/// Canonical holding of one security and instrument kind after aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub security_id: SecurityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    pub instrument_kind: InstrumentKind,
    pub shares: f64,
    pub value: f64,
}

impl Position {
    pub fn new(
        security_id: SecurityId,
        name: impl Into<String>,
        ticker: Option<String>,
        instrument_kind: InstrumentKind,
        shares: f64,
        value: f64,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("shares", shares)?;
        validate_non_negative("value", value)?;

        Ok(Self {
            security_id,
            name: name.into(),
            ticker: normalize_ticker(ticker.as_deref()),
            instrument_kind,
            shares,
            value,
        })
    }

    pub fn key(&self) -> PositionKey {
        PositionKey::new(self.security_id.clone(), self.instrument_kind)
    }

    /// Ticker if known, otherwise the security id.
    pub fn label(&self) -> &str {
        self.ticker
            .as_deref()
            .unwrap_or_else(|| self.security_id.as_str())
    }
}

/// Trim and uppercase a ticker, mapping blanks to `None`.
pub fn normalize_ticker(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|ticker| !ticker.is_empty())
        .map(str::to_ascii_uppercase)
}

pub(crate) fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
