mod diff;
mod profile;
mod trends;

use std::env;
use std::path::PathBuf;
use std::time::Instant;

use filingscope_core::{Dataset, EngineConfig, EntityId, Envelope, EnvelopeError, PipelineReport};
use serde_json::Value;

use crate::cli::{Cli, Command, ThresholdArgs};
use crate::error::CliError;
use crate::metadata::Metadata;

/// Rows for the `table` output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(title: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            title: title.into(),
            headers: headers.iter().map(|header| (*header).to_owned()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_row(mut self, row: Vec<String>) -> Self {
        self.rows.push(row);
        self
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

pub struct CommandResult {
    pub data: Value,
    /// Individual records for `ndjson` output.
    pub records: Vec<Value>,
    pub tables: Vec<Table>,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
    /// Entities covered by the response.
    pub entities: Vec<EntityId>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            records: Vec::new(),
            tables: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            entities: Vec::new(),
        }
    }

    pub fn with_entities(mut self, entities: Vec<EntityId>) -> Self {
        self.entities.extend(entities);
        self
    }

    pub fn with_records(mut self, records: Vec<Value>) -> Self {
        self.records.extend(records);
        self
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_errors(mut self, errors: Vec<EnvelopeError>) -> Self {
        self.errors.extend(errors);
        self
    }
}

/// A finished command: the envelope plus the renderer-specific views of it.
pub struct CommandOutput {
    pub envelope: Envelope<Value>,
    pub records: Vec<Value>,
    pub tables: Vec<Table>,
}

pub fn run(cli: &Cli) -> Result<CommandOutput, CliError> {
    let started = Instant::now();
    let config = resolve_config(cli.config.clone(), &cli.thresholds)?;
    let dataset = load_dataset(cli.dataset.clone())?;

    let command_result = match &cli.command {
        Command::Diff(args) => diff::run(args, &dataset, &config)?,
        Command::Trends(args) => trends::run(args, &dataset, &config)?,
        Command::Profile(args) => profile::run(args, &dataset, &config)?,
    };

    let CommandResult {
        data,
        records,
        tables,
        warnings,
        errors,
        entities,
    } = command_result;

    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let mut metadata = Metadata::new(latency_ms);
    for anomaly in &dataset.anomalies {
        metadata.push_warning(format!("dataset snapshot #{}: {}", anomaly.row, anomaly.kind));
    }
    for warning in warnings {
        metadata.push_warning(warning);
    }

    let meta = metadata.into_envelope_meta()?.with_entities(entities);
    let envelope = Envelope::with_errors(meta, data, errors)?;
    Ok(CommandOutput {
        envelope,
        records,
        tables,
    })
}

/// Turn the entity-level outcomes of a pipeline run into envelope warnings
/// and errors.
fn report_issues(report: &PipelineReport) -> Result<(Vec<String>, Vec<EnvelopeError>), CliError> {
    let mut warnings = report
        .skipped
        .iter()
        .map(|entity_id| format!("entity '{entity_id}' skipped: fewer than two snapshots"))
        .collect::<Vec<_>>();
    if !report.anomalies.is_empty() {
        warnings.push(format!(
            "{} position rows excluded as anomalies",
            report.anomalies.len()
        ));
    }

    let errors = report
        .failures
        .iter()
        .map(EnvelopeError::from_failure)
        .collect::<Result<Vec<_>, _>>()?;

    Ok((warnings, errors))
}

fn load_dataset(flag: Option<PathBuf>) -> Result<Dataset, CliError> {
    let path = flag.or_else(|| path_from_env("FILINGSCOPE_DATASET")).ok_or_else(|| {
        CliError::Command(String::from(
            "no dataset given: pass --dataset or set FILINGSCOPE_DATASET",
        ))
    })?;
    Ok(Dataset::from_path(path)?)
}

/// Config file from the flag, then `FILINGSCOPE_CONFIG`, then defaults;
/// threshold flags override whatever was loaded.
fn resolve_config(flag: Option<PathBuf>, overrides: &ThresholdArgs) -> Result<EngineConfig, CliError> {
    let mut config = match flag.or_else(|| path_from_env("FILINGSCOPE_CONFIG")) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading engine config");
            EngineConfig::from_path(path)?
        }
        None => EngineConfig::default(),
    };

    if let Some(value) = overrides.materiality {
        config.materiality_threshold = value;
    }
    if let Some(value) = overrides.significance {
        config.significance_threshold_pct = value;
    }
    if let Some(value) = overrides.strong {
        config.strong_threshold_pct = value;
    }
    if let Some(value) = overrides.window {
        config.window_transitions = value;
    }
    if let Some(value) = overrides.top_k {
        config.large_position_top_k = value;
    }
    if let Some(value) = overrides.large_position {
        config.large_position_threshold = value;
    }

    config.validate()?;
    Ok(config)
}

fn path_from_env(key: &str) -> Option<PathBuf> {
    let path = PathBuf::from(env::var_os(key)?);
    if path.as_os_str().is_empty() {
        None
    } else {
        Some(path)
    }
}

fn format_amount(value: f64) -> String {
    format!("{value:.0}")
}

fn format_percent(value: Option<f64>) -> String {
    value.map_or_else(|| String::from("-"), |pct| format!("{pct:+.2}%"))
}
