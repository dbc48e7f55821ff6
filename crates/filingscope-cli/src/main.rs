mod cli;
mod commands;
mod error;
mod metadata;
mod output;

use std::env;
use std::io;
use std::process::ExitCode;

use clap::Parser;
use filingscope_core::Envelope;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::CliError;

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(code) => code,
        Err(error) => {
            tracing::debug!(?error, "command failed");
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();

    let output = commands::run(&cli)?;
    output::render(&output, cli.format, cli.pretty)?;

    exit_status(&output.envelope, cli.strict).map(ExitCode::from)
}

/// 0 on a clean response, 3 when entity errors were reported. Strict mode
/// turns any warning or error into a failure.
fn exit_status(envelope: &Envelope<Value>, strict: bool) -> Result<u8, CliError> {
    if strict && (!envelope.meta.warnings.is_empty() || !envelope.errors.is_empty()) {
        return Err(CliError::StrictModeViolation {
            warning_count: envelope.meta.warnings.len(),
            error_count: envelope.errors.len(),
        });
    }

    if !envelope.errors.is_empty() {
        tracing::warn!(entities = ?envelope.failed_entities(), "response carries entity errors");
        return Ok(3);
    }

    Ok(0)
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let env_filter = env::var("FILINGSCOPE_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}
