//! Behavior-driven tests for CLI user journeys
//!
//! These tests run the `filingscope` binary against dataset files on disk
//! and check what a user observes: the envelope on stdout and the exit code.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::{tempdir, TempDir};

const DATASET: &str = r#"{
  "entities": [
    { "id": "berkshire", "display_name": "Berkshire Hathaway", "kind": "fund" },
    { "id": "pershing", "display_name": "Pershing Square", "kind": "fund" },
    { "id": "solo", "display_name": "Solo Capital", "kind": "individual" }
  ],
  "snapshots": [
    { "entity_id": "berkshire", "as_of_date": "2024-03-31",
      "positions": [
        { "security_id": "037833100", "name": "APPLE INC", "shares": 500000, "value": 50000000 },
        { "security_id": "166764100", "name": "CHEVRON CORP", "shares": 500000, "value": 50000000 }
      ] },
    { "entity_id": "berkshire", "as_of_date": "2024-06-30",
      "positions": [
        { "security_id": "037833100", "name": "APPLE INC", "shares": 1000000, "value": 100000000 },
        { "security_id": "037833100", "name": "APPLE INC", "instrument_kind": "CALL",
          "shares": 10000, "value": 5000000 },
        { "security_id": "166764100", "name": "CHEVRON CORP", "shares": 500000, "value": 40000000 }
      ] },
    { "entity_id": "pershing", "as_of_date": "2024-03-31",
      "positions": [
        { "security_id": "037833100", "name": "APPLE INC", "shares": 10000, "value": 1000000 },
        { "security_id": "594918104", "name": "MICROSOFT CORP", "shares": 10000, "value": 4000000 }
      ] },
    { "entity_id": "pershing", "as_of_date": "2024-06-30",
      "positions": [
        { "security_id": "037833100", "name": "APPLE INC", "shares": 40000, "value": 4200000 },
        { "security_id": "594918104", "name": "MICROSOFT CORP", "shares": 20000, "value": 9000000 }
      ] },
    { "entity_id": "solo", "as_of_date": "2024-06-30",
      "positions": [
        { "security_id": "594918104", "name": "MICROSOFT CORP", "shares": 100, "value": 45000 }
      ] }
  ],
  "securities": {
    "037833100": { "ticker": "AAPL" },
    "166764100": { "ticker": "CVX" },
    "594918104": { "ticker": "MSFT" }
  },
  "sectors": { "AAPL": "Technology", "CVX": "Energy", "MSFT": "Technology" }
}"#;

const CLEAN_DATASET: &str = r#"{
  "entities": [{ "id": "pershing", "display_name": "Pershing Square", "kind": "fund" }],
  "snapshots": [
    { "entity_id": "pershing", "as_of_date": "2024-03-31",
      "positions": [{ "security_id": "037833100", "shares": 10000, "value": 1000000 }] },
    { "entity_id": "pershing", "as_of_date": "2024-06-30",
      "positions": [{ "security_id": "037833100", "shares": 40000, "value": 4200000 }] }
  ]
}"#;

struct DatasetFile {
    _dir: TempDir,
    path: PathBuf,
}

impl DatasetFile {
    fn arg(&self) -> &str {
        self.path.to_str().expect("utf-8 temp path")
    }
}

fn dataset_file(contents: &str) -> DatasetFile {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("filings.json");
    fs::write(&path, contents).expect("write dataset");
    DatasetFile { _dir: dir, path }
}

fn filingscope(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_filingscope"))
        .args(args)
        .env_remove("FILINGSCOPE_DATASET")
        .env_remove("FILINGSCOPE_CONFIG")
        .env("FILINGSCOPE_LOG", "off")
        .output()
        .expect("filingscope binary runs")
}

fn envelope(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is one JSON envelope")
}

fn exit_code(output: &Output) -> i32 {
    output.status.code().expect("process exited normally")
}

fn entities(envelope: &Value) -> Vec<&str> {
    envelope["meta"]["entities"]
        .as_array()
        .expect("entities listed")
        .iter()
        .map(|entity| entity.as_str().expect("entity id string"))
        .collect()
}

// =============================================================================
// CLI User Journey: Diff
// =============================================================================

#[test]
fn user_can_diff_every_entity_and_sees_options_only_on_request() {
    // Given: A dataset with two diffable entities and one single-snapshot entity
    let dataset = dataset_file(DATASET);

    // When: They run a plain diff
    let output = filingscope(&["--dataset", dataset.arg(), "diff"]);

    // Then: The command succeeds with one diff per diffable entity
    assert_eq!(exit_code(&output), 0);
    let body = envelope(&output);
    let diffs = body["data"]["diffs"].as_array().expect("diffs array");
    assert_eq!(diffs.len(), 2);
    assert_eq!(diffs[0]["entity_id"], "berkshire");
    assert_eq!(diffs[1]["entity_id"], "pershing");

    // And: Berkshire's stock purchase is a strong equity buy, with no option events shown
    let apple = &diffs[0]["events"][0];
    assert_eq!(apple["instrument_kind"], "EQUITY");
    assert_eq!(apple["classification"], "increased");
    assert_eq!(apple["conviction"], "buy");
    assert_eq!(apple["percent_change"], 100.0);
    assert!(diffs[0].get("option_events").is_none());

    // And: The envelope lists every entity and warns about the skipped one
    assert_eq!(entities(&body), vec!["berkshire", "pershing", "solo"]);
    let warnings = body["meta"]["warnings"].as_array().expect("warnings");
    assert!(warnings
        .iter()
        .any(|warning| warning.as_str().is_some_and(|text| text.contains("'solo' skipped"))));

    // When: They ask for option events too
    let output = filingscope(&["--dataset", dataset.arg(), "diff", "--include-options"]);

    // Then: The calls appear as a separate new option position
    assert_eq!(exit_code(&output), 0);
    let body = envelope(&output);
    let calls = &body["data"]["diffs"][0]["option_events"][0];
    assert_eq!(calls["instrument_kind"], "CALL");
    assert_eq!(calls["classification"], "new_position");
    assert_eq!(calls["current_shares"], 10000.0);
}

#[test]
fn user_can_restrict_diff_to_one_entity() {
    // Given: A dataset with several entities
    let dataset = dataset_file(DATASET);

    // When: They diff only Pershing
    let output = filingscope(&["--dataset", dataset.arg(), "diff", "--entity", "pershing"]);

    // Then: Only Pershing's diff and entity are reported
    assert_eq!(exit_code(&output), 0);
    let body = envelope(&output);
    let diffs = body["data"]["diffs"].as_array().expect("diffs array");
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0]["events"].as_array().map(Vec::len), Some(2));
    assert_eq!(entities(&body), vec!["pershing"]);
}

#[test]
fn ndjson_output_has_meta_line_then_one_line_per_event() {
    // Given: A dataset with three equity events across two entities
    let dataset = dataset_file(DATASET);

    // When: They request newline-delimited JSON
    let output = filingscope(&["--dataset", dataset.arg(), "--format", "ndjson", "diff"]);

    // Then: The first line is metadata and each following line is one record
    assert_eq!(exit_code(&output), 0);
    let stdout = String::from_utf8(output.stdout).expect("utf-8 stdout");
    let lines = stdout
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).expect("each line is JSON"))
        .collect::<Vec<_>>();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["type"], "meta");
    assert!(lines[0]["meta"]["request_id"].is_string());
    assert!(lines[1..].iter().all(|line| line["type"] == "record"));
    assert!(lines[1..]
        .iter()
        .all(|line| line["data"]["instrument_kind"] == "EQUITY"));
}

// =============================================================================
// CLI User Journey: Trends and Profiles
// =============================================================================

#[test]
fn trends_limit_caps_the_most_bought_list() {
    // Given: AAPL bought by two entities and MSFT by one
    let dataset = dataset_file(DATASET);

    // When: They ask for the single most bought security
    let output = filingscope(&["--dataset", dataset.arg(), "trends", "--limit", "1"]);

    // Then: Only AAPL is listed, with both buyers
    assert_eq!(exit_code(&output), 0);
    let body = envelope(&output);
    let most_bought = body["data"]["most_bought"].as_array().expect("ranking");
    assert_eq!(most_bought.len(), 1);
    assert_eq!(most_bought[0]["key"], "037833100");
    assert_eq!(most_bought[0]["buyer_count"], 2);
    assert_eq!(body["data"]["entities_considered"], 2);

    // And: A zero limit is rejected as a usage error
    let output = filingscope(&["--dataset", dataset.arg(), "trends", "--limit", "0"]);
    assert_eq!(exit_code(&output), 2);
}

#[test]
fn trends_render_as_tables() {
    // Given: A dataset on disk
    let dataset = dataset_file(DATASET);

    // When: They request the table format
    let output = filingscope(&["--dataset", dataset.arg(), "--format", "table", "trends"]);

    // Then: Every trend section is printed
    assert_eq!(exit_code(&output), 0);
    let stdout = String::from_utf8(output.stdout).expect("utf-8 stdout");
    for section in ["most bought", "sector rotation", "sector net flows", "sentiment"] {
        assert!(stdout.contains(section), "missing section {section}");
    }
    assert!(stdout.contains("AAPL (037833100)"));
}

#[test]
fn profile_reports_equity_concentration_over_requested_periods() {
    // Given: Berkshire holds AAPL stock, AAPL calls and CVX
    let dataset = dataset_file(DATASET);

    // When: They profile Berkshire's latest period only
    let output = filingscope(&[
        "--dataset",
        dataset.arg(),
        "profile",
        "berkshire",
        "--periods",
        "1",
    ]);

    // Then: Concentration covers the two stock positions and history has one point
    assert_eq!(exit_code(&output), 0);
    let body = envelope(&output);
    let concentration = &body["data"]["concentration"];
    assert_eq!(concentration["position_count"], 2);
    assert_eq!(concentration["total_value"], 140_000_000.0);
    let history = body["data"]["value_history"].as_array().expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["as_of_date"], "2024-06-30");
    assert_eq!(entities(&body), vec!["berkshire"]);

    // And: An unknown entity is a usage error
    let output = filingscope(&["--dataset", dataset.arg(), "profile", "ghost"]);
    assert_eq!(exit_code(&output), 2);
}

// =============================================================================
// CLI User Journey: Exit Codes
// =============================================================================

#[test]
fn strict_mode_fails_on_warnings_but_still_prints_the_envelope() {
    // Given: A dataset where one entity is skipped
    let dataset = dataset_file(DATASET);

    // When: They run in strict mode
    let output = filingscope(&["--dataset", dataset.arg(), "--strict", "diff"]);

    // Then: The envelope is printed and the process exits with the strict code
    assert_eq!(exit_code(&output), 5);
    assert!(envelope(&output)["meta"]["warnings"].is_array());
    let stderr = String::from_utf8(output.stderr).expect("utf-8 stderr");
    assert!(stderr.contains("strict mode failed"));
}

#[test]
fn strict_mode_passes_a_clean_dataset() {
    // Given: A dataset with no warnings
    let dataset = dataset_file(CLEAN_DATASET);

    // When: They run trends in strict mode
    let output = filingscope(&["--dataset", dataset.arg(), "--strict", "trends"]);

    // Then: The command succeeds
    assert_eq!(exit_code(&output), 0);
    assert!(envelope(&output).get("errors").is_none());
}

#[test]
fn broken_inputs_map_to_distinct_exit_codes() {
    // Given: A file that is not JSON
    let broken = dataset_file("entities: []");

    // Then: A parse failure exits with the store code
    let output = filingscope(&["--dataset", broken.arg(), "diff"]);
    assert_eq!(exit_code(&output), 3);
    assert!(output.stdout.is_empty());

    // And: A missing file exits with the io code
    let output = filingscope(&["--dataset", "/nonexistent/filings.json", "diff"]);
    assert_eq!(exit_code(&output), 10);

    // And: No dataset at all is a usage error
    let output = filingscope(&["diff"]);
    assert_eq!(exit_code(&output), 2);

    // And: Inconsistent thresholds are rejected before any work
    let dataset = dataset_file(CLEAN_DATASET);
    let output = filingscope(&[
        "--dataset",
        dataset.arg(),
        "--significance",
        "30",
        "--strong",
        "10",
        "diff",
    ]);
    assert_eq!(exit_code(&output), 2);
}
