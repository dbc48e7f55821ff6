use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{CoreError, ValidationError};

/// Runtime thresholds shared by the diff engine and trend aggregator.
///
/// Every field has a default, so a config file only needs the values it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Minimum dollar value for a new or closed position to be reported.
    pub materiality_threshold: f64,
    /// Minimum absolute share change, in percent, for an increase/decrease.
    pub significance_threshold_pct: f64,
    /// Absolute share change, in percent, that tags a move as Buy/Sell.
    pub strong_threshold_pct: f64,
    /// Minimum value for a new position to count as a large new bet.
    pub large_position_threshold: f64,
    /// How many large new positions to keep.
    pub large_position_top_k: usize,
    /// Number of snapshot transitions per entity fed into trend signals.
    pub window_transitions: usize,
    /// Securities with fewer distinct buyers are left out of the most-bought ranking.
    pub min_buyers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            materiality_threshold: 1_000_000.0,
            significance_threshold_pct: 5.0,
            strong_threshold_pct: 25.0,
            large_position_threshold: 50_000_000.0,
            large_position_top_k: 5,
            window_transitions: 2,
            min_buyers: 1,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(input: &str) -> Result<Self, CoreError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let raw = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Validate that thresholds are usable together.
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_negative("materiality_threshold", self.materiality_threshold)?;
        non_negative("significance_threshold_pct", self.significance_threshold_pct)?;
        non_negative("strong_threshold_pct", self.strong_threshold_pct)?;
        non_negative("large_position_threshold", self.large_position_threshold)?;

        if self.strong_threshold_pct < self.significance_threshold_pct {
            return Err(ValidationError::StrongBelowSignificance {
                strong: self.strong_threshold_pct,
                significance: self.significance_threshold_pct,
            });
        }
        if self.large_position_top_k == 0 {
            return Err(ValidationError::ZeroValue {
                field: "large_position_top_k",
            });
        }
        if self.window_transitions == 0 {
            return Err(ValidationError::ZeroValue {
                field: "window_transitions",
            });
        }
        if self.min_buyers == 0 {
            return Err(ValidationError::ZeroValue {
                field: "min_buyers",
            });
        }

        Ok(())
    }

    /// Snapshots per entity needed to cover the configured window.
    pub fn snapshots_needed(&self) -> usize {
        self.window_transitions + 1
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    crate::domain::validate_non_negative(field, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_canonical_thresholds() {
        let config = EngineConfig::default();

        assert_eq!(config.materiality_threshold, 1_000_000.0);
        assert_eq!(config.significance_threshold_pct, 5.0);
        assert_eq!(config.strong_threshold_pct, 25.0);
        assert_eq!(config.large_position_threshold, 50_000_000.0);
        assert_eq!(config.large_position_top_k, 5);
        assert_eq!(config.window_transitions, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config = EngineConfig::from_json_str(r#"{"materiality_threshold": 250000}"#)
            .expect("config should load");

        assert_eq!(config.materiality_threshold, 250_000.0);
        assert_eq!(config.strong_threshold_pct, 25.0);
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = EngineConfig::from_json_str(r#"{"materiality": 1}"#).expect_err("must fail");
        assert!(matches!(err, CoreError::Serialization(_)));
    }

    #[test]
    fn rejects_strong_below_significance() {
        let config = EngineConfig {
            strong_threshold_pct: 2.0,
            ..EngineConfig::default()
        };
        let err = config.validate().expect_err("must fail");
        assert!(matches!(err, ValidationError::StrongBelowSignificance { .. }));
    }

    #[test]
    fn rejects_zero_window() {
        let err = EngineConfig::from_json_str(r#"{"window_transitions": 0}"#).expect_err("must fail");
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::ZeroValue {
                field: "window_transitions"
            })
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{"large_position_top_k": 10}"#).expect("write config");

        let config = EngineConfig::from_path(&path).expect("config should load");
        assert_eq!(config.large_position_top_k, 10);
    }
}
