use std::io::{self, Write};

use filingscope_core::Envelope;
use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::commands::{CommandOutput, Table};
use crate::error::CliError;

pub fn render(output: &CommandOutput, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    match format {
        OutputFormat::Json => render_json(&mut writer, &output.envelope, pretty)?,
        OutputFormat::Ndjson => render_ndjson(&mut writer, output)?,
        OutputFormat::Table => render_table(&mut writer, output)?,
    }
    writer.flush()?;
    Ok(())
}

fn render_json(
    writer: &mut impl Write,
    envelope: &Envelope<Value>,
    pretty: bool,
) -> Result<(), CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(envelope)?
    } else {
        serde_json::to_string(envelope)?
    };
    writeln!(writer, "{payload}")?;
    Ok(())
}

/// One `meta` line, one line per record, then one line per error.
fn render_ndjson(writer: &mut impl Write, output: &CommandOutput) -> Result<(), CliError> {
    let envelope = &output.envelope;
    writeln!(
        writer,
        "{}",
        serde_json::to_string(&json!({ "type": "meta", "meta": envelope.meta }))?
    )?;
    for record in &output.records {
        writeln!(
            writer,
            "{}",
            serde_json::to_string(&json!({ "type": "record", "data": record }))?
        )?;
    }
    for error in &envelope.errors {
        writeln!(
            writer,
            "{}",
            serde_json::to_string(&json!({ "type": "error", "error": error }))?
        )?;
    }
    Ok(())
}

fn render_table(writer: &mut impl Write, output: &CommandOutput) -> Result<(), CliError> {
    let envelope = &output.envelope;
    writeln!(writer, "request_id  : {}", envelope.meta.request_id)?;
    writeln!(writer, "schema      : {}", envelope.meta.schema_version)?;
    writeln!(writer, "generated_at: {}", envelope.meta.generated_at)?;
    writeln!(writer, "latency_ms  : {}", envelope.meta.latency_ms)?;

    if !envelope.meta.warnings.is_empty() {
        writeln!(writer, "warnings:")?;
        for warning in &envelope.meta.warnings {
            writeln!(writer, "  - {warning}")?;
        }
    }

    for table in &output.tables {
        writeln!(writer)?;
        write_table(writer, table)?;
    }

    if !envelope.errors.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "errors:")?;
        for error in &envelope.errors {
            match &error.entity_id {
                Some(entity_id) => {
                    writeln!(writer, "  - {} [{entity_id}]: {}", error.code, error.message)?
                }
                None => writeln!(writer, "  - {}: {}", error.code, error.message)?,
            }
        }
    }

    Ok(())
}

fn write_table(writer: &mut impl Write, table: &Table) -> io::Result<()> {
    writeln!(writer, "{}", table.title)?;
    if table.rows.is_empty() {
        return writeln!(writer, "  (none)");
    }

    let mut widths = table
        .headers
        .iter()
        .map(|header| header.len())
        .collect::<Vec<_>>();
    for row in &table.rows {
        for (index, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(index) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}", width = *width))
            .collect::<Vec<_>>()
            .join("  ")
    };
    writeln!(writer, "  {}", line(&table.headers).trim_end())?;
    writeln!(
        writer,
        "  {}",
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  ")
    )?;
    for row in &table.rows {
        writeln!(writer, "  {}", line(row).trim_end())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_columns_are_aligned() {
        let table = Table::new("most bought", &["rank", "security"])
            .with_row(vec![String::from("1"), String::from("AAPL")])
            .with_row(vec![String::from("10"), String::from("BRK.B")]);

        let mut buffer = Vec::new();
        write_table(&mut buffer, &table).expect("write");
        let rendered = String::from_utf8(buffer).expect("utf8");

        assert_eq!(
            rendered,
            "most bought\n  rank  security\n  ----  --------\n  1     AAPL\n  10    BRK.B\n"
        );
    }

    #[test]
    fn empty_table_says_none() {
        let table = Table::new("sector rotation", &["sector"]);
        let mut buffer = Vec::new();
        write_table(&mut buffer, &table).expect("write");
        let rendered = String::from_utf8(buffer).expect("utf8");
        assert!(rendered.ends_with("(none)\n"));
    }
}
