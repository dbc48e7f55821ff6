use filingscope_core::{Dataset, EngineConfig, Pipeline, TrendReport, TrendSignal};

use crate::cli::TrendsArgs;
use crate::error::CliError;

use super::{format_amount, format_percent, report_issues, CommandResult, Table};

pub fn run(args: &TrendsArgs, dataset: &Dataset, config: &EngineConfig) -> Result<CommandResult, CliError> {
    if args.limit == 0 {
        return Err(CliError::Command(String::from("--limit must be greater than zero")));
    }

    let report = Pipeline::new(&dataset.store, &dataset.resolver, &dataset.classifier, config).run()?;
    let (warnings, errors) = report_issues(&report)?;
    let entities = report.entity_ids();

    let mut trends = report.trends;
    trends.most_bought.truncate(args.limit);

    let records = trends
        .most_bought
        .iter()
        .chain(trends.sector_rotation.iter())
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    let tables = trend_tables(&trends);

    let mut result = CommandResult::ok(serde_json::to_value(&trends)?)
        .with_records(records)
        .with_warnings(warnings)
        .with_errors(errors)
        .with_entities(entities);
    for table in tables {
        result = result.with_table(table);
    }
    if trends.entities_considered == 0 {
        result = result.with_warning("no entity had two snapshots in the window");
    }
    Ok(result)
}

fn trend_tables(trends: &TrendReport) -> Vec<Table> {
    let mut most_bought = Table::new(
        "most bought",
        &["rank", "security", "buyers", "sellers", "net_flow", "consensus"],
    );
    for signal in &trends.most_bought {
        most_bought.push_row(vec![
            signal.rank.to_string(),
            signal_label(signal),
            signal.buyer_count.to_string(),
            signal.seller_count.to_string(),
            format_amount(signal.net_dollar_flow),
            signal.consensus.as_str().to_owned(),
        ]);
    }

    let mut rotation = Table::new(
        "sector rotation",
        &["rank", "sector", "change", "pct", "growing", "shrinking"],
    );
    for signal in &trends.sector_rotation {
        rotation.push_row(vec![
            signal.rank.to_string(),
            signal.key.clone(),
            format_amount(signal.net_dollar_flow),
            format_percent(signal.percent_change),
            signal.buyer_count.to_string(),
            signal.seller_count.to_string(),
        ]);
    }

    let mut flows = Table::new("sector net flows", &["sector", "net_flow"]);
    for flow in trends
        .sector_flows
        .inflows
        .iter()
        .chain(trends.sector_flows.outflows.iter())
    {
        flows.push_row(vec![flow.sector.clone(), format_amount(flow.net_flow)]);
    }

    let mut large = Table::new("large new positions", &["entity", "security", "value"]);
    for event in &trends.large_new_positions {
        large.push_row(vec![
            event.entity_id.to_string(),
            event.label().to_owned(),
            format_amount(event.current_value),
        ]);
    }

    let mut sentiment = Table::new(
        "sentiment",
        &["entity", "previous", "current", "change", "stance"],
    );
    for reading in &trends.sentiment {
        sentiment.push_row(vec![
            reading.entity_id.to_string(),
            format_amount(reading.previous_total),
            format_amount(reading.current_total),
            format_percent(reading.ratio.map(|ratio| ratio * 100.0)),
            reading.stance.as_str().to_owned(),
        ]);
    }

    vec![most_bought, rotation, flows, large, sentiment]
}

fn signal_label(signal: &TrendSignal) -> String {
    match &signal.label {
        Some(label) if label != &signal.key => format!("{label} ({})", signal.key),
        _ => signal.key.clone(),
    }
}
