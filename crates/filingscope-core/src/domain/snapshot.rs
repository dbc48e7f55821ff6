use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::{DisclosureDate, EntityId, InstrumentKind};

/// One disclosed line item as it arrives from the snapshot store, before validation.
///
/// Numeric fields accept JSON numbers or numeric strings (`"1,250"` included);
/// anything else deserializes as `None` and is reported by the aggregator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPosition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument_kind: Option<InstrumentKind>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub shares: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub value: Option<f64>,
}

impl RawPosition {
    pub fn new(security_id: impl Into<String>, name: impl Into<String>, shares: f64, value: f64) -> Self {
        Self {
            security_id: Some(security_id.into()),
            name: Some(name.into()),
            ticker: None,
            instrument_kind: None,
            shares: Some(shares),
            value: Some(value),
        }
    }

    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = Some(ticker.into());
        self
    }

    pub fn with_kind(mut self, kind: InstrumentKind) -> Self {
        self.instrument_kind = Some(kind);
        self
    }
}

/// Immutable, dated record of every position one entity disclosed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub entity_id: EntityId,
    pub as_of_date: DisclosureDate,
    pub positions: Vec<RawPosition>,
    /// Portfolio value as reported by the filing, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_value: Option<f64>,
}

impl Snapshot {
    pub fn new(entity_id: EntityId, as_of_date: DisclosureDate, positions: Vec<RawPosition>) -> Self {
        Self {
            entity_id,
            as_of_date,
            positions,
            total_value: None,
        }
    }

    pub fn with_total_value(mut self, total_value: f64) -> Self {
        self.total_value = Some(total_value);
        self
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value))
}

/// A JSON number, or a numeric string with optional thousands separators.
pub(crate) fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }
}
