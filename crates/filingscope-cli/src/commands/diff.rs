use std::collections::BTreeSet;

use filingscope_core::{
    Anomaly, ChangeEvent, Dataset, DiffReport, EngineConfig, EntityId, Pipeline,
};
use serde::Serialize;

use crate::cli::DiffArgs;
use crate::error::CliError;

use super::{format_amount, format_percent, report_issues, CommandResult, Table};

#[derive(Debug, Serialize)]
struct DiffResponseData {
    diffs: Vec<DiffReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    skipped: Vec<EntityId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    anomalies: Vec<Anomaly>,
}

pub fn run(args: &DiffArgs, dataset: &Dataset, config: &EngineConfig) -> Result<CommandResult, CliError> {
    let wanted = args
        .entities
        .iter()
        .map(|raw| EntityId::parse(raw))
        .collect::<Result<BTreeSet<_>, _>>()?;

    let report = Pipeline::new(&dataset.store, &dataset.resolver, &dataset.classifier, config).run()?;
    let (warnings, mut errors) = report_issues(&report)?;

    let keep = |entity_id: &EntityId| wanted.is_empty() || wanted.contains(entity_id);
    errors.retain(|error| error.entity_id.as_ref().map_or(true, |id| keep(id)));
    let entities = report
        .entity_ids()
        .into_iter()
        .filter(|entity_id| keep(entity_id))
        .collect::<Vec<_>>();
    let missing = wanted
        .iter()
        .filter(|entity_id| {
            !report.diffs.iter().any(|diff| &diff.entity_id == *entity_id)
                && !report.skipped.contains(*entity_id)
                && !report.failures.iter().any(|failure| &failure.entity_id == *entity_id)
        })
        .map(|entity_id| format!("entity '{entity_id}' not found in dataset"))
        .collect::<Vec<_>>();

    let mut diffs = report
        .diffs
        .into_iter()
        .filter(|diff| keep(&diff.entity_id))
        .collect::<Vec<_>>();
    if !args.include_options {
        for diff in &mut diffs {
            diff.option_events.clear();
        }
    }

    let records = diffs
        .iter()
        .flat_map(|diff| diff.events.iter().chain(diff.option_events.iter()))
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    let tables = diffs.iter().map(diff_table).collect::<Vec<_>>();

    let data = serde_json::to_value(DiffResponseData {
        diffs,
        skipped: report
            .skipped
            .into_iter()
            .filter(|entity_id| keep(entity_id))
            .collect(),
        anomalies: report
            .anomalies
            .into_iter()
            .filter(|anomaly| anomaly.entity_id.as_ref().map_or(true, |id| keep(id)))
            .collect(),
    })?;

    let mut result = CommandResult::ok(data)
        .with_records(records)
        .with_warnings(warnings)
        .with_errors(errors)
        .with_entities(entities);
    for table in tables {
        result = result.with_table(table);
    }
    Ok(result.with_warnings(missing))
}

fn diff_table(diff: &DiffReport) -> Table {
    let mut table = Table::new(
        format!(
            "{} {} -> {} (residual {})",
            diff.entity_id,
            diff.previous_date,
            diff.current_date,
            format_amount(diff.residual_value_delta)
        ),
        &["security", "name", "change", "conviction", "shares", "value", "pct"],
    );
    for event in diff.events.iter().chain(diff.option_events.iter()) {
        table.push_row(event_row(event));
    }
    table
}

fn event_row(event: &ChangeEvent) -> Vec<String> {
    let change = if event.instrument_kind.is_option() {
        format!("{} ({})", event.classification, event.instrument_kind)
    } else {
        event.classification.to_string()
    };
    vec![
        event.label().to_owned(),
        event.name.clone(),
        change,
        event
            .conviction
            .map_or_else(String::new, |conviction| conviction.as_str().to_owned()),
        format_amount(event.delta_shares),
        format_amount(event.delta_value),
        format_percent(event.percent_change),
    ]
}
