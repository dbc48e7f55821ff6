//! CLI argument definitions for filingscope.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `diff` | Classified position changes per entity |
//! | `trends` | Cross-entity signals (most bought, sector rotation, sentiment) |
//! | `profile` | Concentration and value history of one entity |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--dataset` | `$FILINGSCOPE_DATASET` | JSON dataset to analyze |
//! | `--config` | `$FILINGSCOPE_CONFIG` | JSON engine config |
//! | `--format` | `json` | Output format (json, ndjson, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Treat warnings as errors |
//!
//! # Examples
//!
//! ```bash
//! filingscope --dataset filings.json diff --entity berkshire
//! filingscope --dataset filings.json trends --window 4 --format table
//! filingscope --dataset filings.json profile berkshire --periods 8 --pretty
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Institutional holdings change tracker.
#[derive(Debug, Parser)]
#[command(
    name = "filingscope",
    author,
    version,
    about = "Diff periodic holdings disclosures and surface cross-entity trends"
)]
pub struct Cli {
    /// JSON dataset with entities, snapshots and optional lookups.
    #[arg(long, global = true)]
    pub dataset: Option<PathBuf>,

    /// JSON engine config; flags below override its values.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format for results.
    ///
    /// - json: Single JSON object (default)
    /// - ndjson: Metadata line, then one JSON record per line
    /// - table: Column-aligned text
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat warnings and errors as failures (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    #[command(flatten)]
    pub thresholds: ThresholdArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Engine threshold overrides.
#[derive(Debug, Clone, Default, Args)]
pub struct ThresholdArgs {
    /// Minimum dollar value for a new or closed position.
    #[arg(long, global = true)]
    pub materiality: Option<f64>,

    /// Minimum percent share change for an increase or decrease.
    #[arg(long, global = true)]
    pub significance: Option<f64>,

    /// Percent share change at which a move becomes a Buy/Sell.
    #[arg(long, global = true)]
    pub strong: Option<f64>,

    /// Number of most recent transitions per entity.
    #[arg(long, global = true)]
    pub window: Option<usize>,

    /// How many large new positions to report.
    #[arg(long, global = true)]
    pub top_k: Option<usize>,

    /// Minimum value of a large new position.
    #[arg(long, global = true)]
    pub large_position: Option<f64>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Column-aligned text for terminal display.
    Table,
    /// Single JSON object output.
    Json,
    /// Newline-delimited JSON.
    Ndjson,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classified position changes between consecutive disclosures.
    ///
    ///   filingscope diff
    ///   filingscope diff --entity berkshire --entity pershing
    Diff(DiffArgs),

    /// Cross-entity signals over the configured window.
    ///
    ///   filingscope trends
    ///   filingscope trends --window 4 --top-k 10
    Trends(TrendsArgs),

    /// Concentration metrics and value history of one entity.
    ///
    ///   filingscope profile berkshire --periods 8
    Profile(ProfileArgs),
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Restrict output to these entities (repeatable).
    #[arg(long = "entity")]
    pub entities: Vec<String>,

    /// Include option (CALL/PUT) events.
    #[arg(long, default_value_t = false)]
    pub include_options: bool,
}

#[derive(Debug, Args)]
pub struct TrendsArgs {
    /// Maximum number of most-bought securities to list.
    #[arg(long, default_value_t = 25)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    pub entity: String,

    /// Number of most recent snapshots in the value history.
    #[arg(long, default_value_t = 4)]
    pub periods: usize,
}
