use filingscope_core::{
    concentration, value_history, Concentration, Dataset, EngineConfig, Entity, EntityId, Pipeline,
    SnapshotStore, ValuePoint,
};
use serde::Serialize;

use crate::cli::ProfileArgs;
use crate::error::CliError;

use super::{format_amount, format_percent, CommandResult, Table};

#[derive(Debug, Serialize)]
struct ProfileResponseData {
    entity: Entity,
    #[serde(skip_serializing_if = "Option::is_none")]
    concentration: Option<Concentration>,
    value_history: Vec<ValuePoint>,
}

pub fn run(args: &ProfileArgs, dataset: &Dataset, config: &EngineConfig) -> Result<CommandResult, CliError> {
    if args.periods == 0 {
        return Err(CliError::Command(String::from("--periods must be greater than zero")));
    }

    let entity_id = EntityId::parse(&args.entity)?;
    let entity = dataset
        .store
        .entities()?
        .into_iter()
        .find(|entity| entity.id == entity_id)
        .ok_or_else(|| CliError::Command(format!("entity '{entity_id}' not found in dataset")))?;

    let pipeline = Pipeline::new(&dataset.store, &dataset.resolver, &dataset.classifier, config);
    let history = pipeline.history(&entity_id, args.periods)?;

    let concentration = history.snapshots.last().and_then(concentration);
    let value_history = value_history(&history.snapshots, args.periods);

    let mut result = CommandResult::ok(serde_json::to_value(ProfileResponseData {
        entity,
        concentration: concentration.clone(),
        value_history: value_history.clone(),
    })?)
    .with_entities(vec![entity_id.clone()])
    .with_records(
        value_history
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?,
    );

    if history.snapshots.is_empty() {
        result = result.with_warning(format!("entity '{entity_id}' has no snapshots"));
    } else if concentration.is_none() {
        result = result.with_warning("latest snapshot holds no value");
    }
    if !history.anomalies.is_empty() {
        result = result.with_warning(format!(
            "{} position rows excluded as anomalies",
            history.anomalies.len()
        ));
    }

    if let Some(metrics) = &concentration {
        result = result.with_table(concentration_table(metrics));
    }
    Ok(result.with_table(history_table(&value_history)))
}

fn concentration_table(metrics: &Concentration) -> Table {
    Table::new(
        format!("concentration as of {}", metrics.as_of_date),
        &["positions", "total", "average", "herfindahl", "top3", "top10", "tier"],
    )
    .with_row(vec![
        metrics.position_count.to_string(),
        format_amount(metrics.total_value),
        format_amount(metrics.average_position_size),
        format!("{:.4}", metrics.herfindahl),
        format!("{:.2}%", metrics.top3_weight_pct),
        format!("{:.2}%", metrics.top10_weight_pct),
        metrics.tier.as_str().to_owned(),
    ])
}

fn history_table(points: &[ValuePoint]) -> Table {
    let mut table = Table::new("value history", &["as_of", "total", "return"]);
    for point in points {
        table.push_row(vec![
            point.as_of_date.to_string(),
            format_amount(point.total_value),
            format_percent(point.period_return_pct),
        ]);
    }
    table
}
