//! Behavior-driven tests for cross-entity trend signals
//!
//! These tests verify how diffs from many entities are reduced into rankings
//! users read: most-bought securities, sector rotation, and large new bets.

use filingscope_core::{
    aggregate, aggregate_trends, diff_snapshots, CapitalStance, Consensus, DisclosureDate,
    EngineConfig, EntityId, EntityWindow, InstrumentKind, NoopResolver, RawPosition, Snapshot,
    StaticSectorClassifier, UNKNOWN_SECTOR,
};

const PREVIOUS: &str = "2024-03-31";
const CURRENT: &str = "2024-06-30";

fn window(entity: &str, previous: Vec<RawPosition>, current: Vec<RawPosition>) -> EntityWindow {
    let entity_id = EntityId::parse(entity).expect("valid entity id");
    let previous = aggregate(&Snapshot::new(
        entity_id.clone(),
        DisclosureDate::parse(PREVIOUS).expect("valid date"),
        previous,
    ))
    .snapshot;
    let current = aggregate(&Snapshot::new(
        entity_id.clone(),
        DisclosureDate::parse(CURRENT).expect("valid date"),
        current,
    ))
    .snapshot;
    let diff = diff_snapshots(&previous, &current, &EngineConfig::default()).expect("diff");

    EntityWindow {
        entity_id,
        diffs: vec![diff],
        previous,
        current,
    }
}

fn holding(id: &str, ticker: &str, shares: f64, value: f64) -> RawPosition {
    RawPosition::new(id, ticker, shares, value).with_ticker(ticker)
}

fn energy_classifier() -> StaticSectorClassifier {
    StaticSectorClassifier::default()
        .with_sector("OILA", "Energy")
        .with_sector("OILB", "Energy")
        .with_sector("CHIP", "Technology")
}

// =============================================================================
// Trends: Most Bought
// =============================================================================

#[test]
fn buyer_count_outranks_dollar_size_in_most_bought() {
    // Given: Five entities add modestly to ABC, three add heavily to XYZ
    let mut windows = Vec::new();
    for index in 0..5 {
        windows.push(window(
            &format!("small-{index}"),
            vec![holding("ABC000001", "ABC", 10_000.0, 2_000_000.0)],
            vec![holding("ABC000001", "ABC", 11_000.0, 2_200_000.0)],
        ));
    }
    for index in 0..3 {
        windows.push(window(
            &format!("large-{index}"),
            vec![holding("XYZ000001", "XYZ", 100_000.0, 50_000_000.0)],
            vec![holding("XYZ000001", "XYZ", 200_000.0, 100_000_000.0)],
        ));
    }

    // When: Trends are aggregated
    let report = aggregate_trends(&windows, &NoopResolver, &EngineConfig::default());

    // Then: ABC ranks first on buyer count despite XYZ's larger flow
    let ranking = &report.most_bought;
    assert_eq!(ranking.len(), 2);
    assert_eq!(ranking[0].key, "ABC000001");
    assert_eq!(ranking[0].label.as_deref(), Some("ABC"));
    assert_eq!(ranking[0].buyer_count, 5);
    assert_eq!(ranking[0].rank, 1);
    assert_eq!(ranking[0].consensus, Consensus::Bullish);
    assert_eq!(ranking[1].key, "XYZ000001");
    assert_eq!(ranking[1].buyer_count, 3);
    assert!(ranking[1].net_dollar_flow > ranking[0].net_dollar_flow);
    assert_eq!(ranking[1].rank, 2);
}

#[test]
fn ranking_does_not_depend_on_window_order() {
    // Given: The same windows in two different orders
    let forward = vec![
        window(
            "alpha",
            vec![holding("ABC000001", "ABC", 10_000.0, 2_000_000.0)],
            vec![holding("ABC000001", "ABC", 20_000.0, 4_000_000.0)],
        ),
        window(
            "beta",
            vec![holding("XYZ000001", "XYZ", 10_000.0, 2_000_000.0)],
            vec![holding("XYZ000001", "XYZ", 20_000.0, 4_000_000.0)],
        ),
    ];
    let mut backward = forward.clone();
    backward.reverse();

    // When: Trends are aggregated for both
    let config = EngineConfig::default();
    let first = aggregate_trends(&forward, &energy_classifier(), &config);
    let second = aggregate_trends(&backward, &energy_classifier(), &config);

    // Then: Reports are identical, with the tie broken by security id
    assert_eq!(first, second);
    assert_eq!(first.most_bought[0].key, "ABC000001");
}

// =============================================================================
// Trends: Sector Rotation
// =============================================================================

#[test]
fn sector_rotation_reports_percent_change_and_skips_empty_bases() {
    // Given: Energy holdings fall from $100M to $80M across two entities,
    // and Technology only appears in the current period
    let windows = vec![
        window(
            "alpha",
            vec![holding("OILA00001", "OILA", 1_000_000.0, 60_000_000.0)],
            vec![
                holding("OILA00001", "OILA", 1_000_000.0, 48_000_000.0),
                holding("CHIP00001", "CHIP", 10_000.0, 5_000_000.0),
            ],
        ),
        window(
            "beta",
            vec![holding("OILB00001", "OILB", 500_000.0, 40_000_000.0)],
            vec![holding("OILB00001", "OILB", 500_000.0, 32_000_000.0)],
        ),
    ];

    // When: Trends are aggregated
    let report = aggregate_trends(&windows, &energy_classifier(), &EngineConfig::default());

    // Then: Energy shows -20% and Technology is not ranked at all
    assert_eq!(report.sector_rotation.len(), 1);
    let energy = &report.sector_rotation[0];
    assert_eq!(energy.key, "Energy");
    assert_eq!(energy.percent_change, Some(-20.0));
    assert_eq!(energy.net_dollar_flow, -20_000_000.0);
    assert_eq!(energy.seller_count, 2);
    assert_eq!(energy.consensus, Consensus::Bearish);
    assert!(report
        .sector_rotation
        .iter()
        .all(|signal| signal.key != "Technology"));
}

#[test]
fn unclassified_holdings_land_in_the_unknown_sector() {
    // Given: Holdings with no ticker and with an unmapped ticker
    let windows = vec![window(
        "alpha",
        vec![
            RawPosition::new("NOTICKER1", "MYSTERY CO", 1_000.0, 10_000_000.0),
            holding("ODD000001", "ODD", 1_000.0, 10_000_000.0),
        ],
        vec![
            RawPosition::new("NOTICKER1", "MYSTERY CO", 1_000.0, 12_000_000.0),
            holding("ODD000001", "ODD", 1_000.0, 13_000_000.0),
        ],
    )];

    // When: Trends are aggregated
    let report = aggregate_trends(&windows, &energy_classifier(), &EngineConfig::default());

    // Then: Both are summed into Unknown instead of being dropped
    let unknown = report
        .sector_rotation
        .iter()
        .find(|signal| signal.key == UNKNOWN_SECTOR)
        .expect("unknown sector ranked");
    assert_eq!(unknown.net_dollar_flow, 5_000_000.0);
    assert_eq!(unknown.percent_change, Some(25.0));
}

#[test]
fn options_do_not_move_sector_totals() {
    // Given: An option position that triples in value
    let windows = vec![window(
        "alpha",
        vec![
            holding("OILA00001", "OILA", 1_000.0, 10_000_000.0),
            holding("OILACALL1", "OILA", 100.0, 1_000_000.0).with_kind(InstrumentKind::Call),
        ],
        vec![
            holding("OILA00001", "OILA", 1_000.0, 10_000_000.0),
            holding("OILACALL1", "OILA", 100.0, 3_000_000.0).with_kind(InstrumentKind::Call),
        ],
    )];

    // When: Trends are aggregated
    let report = aggregate_trends(&windows, &energy_classifier(), &EngineConfig::default());

    // Then: Energy is flat
    let energy = &report.sector_rotation[0];
    assert_eq!(energy.key, "Energy");
    assert_eq!(energy.percent_change, Some(0.0));
}

#[test]
fn calls_on_the_same_cusip_do_not_hide_an_equity_buyer() {
    // Given: An entity doubling its OILA stock and opening OILA calls under one id
    let windows = vec![window(
        "alpha",
        vec![holding("OILA00001", "OILA", 1_000.0, 10_000_000.0)],
        vec![
            holding("OILA00001", "OILA", 2_000.0, 20_000_000.0),
            holding("OILA00001", "OILA", 50.0, 4_000_000.0).with_kind(InstrumentKind::Call),
        ],
    )];

    // When: Trends are aggregated
    let report = aggregate_trends(&windows, &energy_classifier(), &EngineConfig::default());

    // Then: The stock purchase counts as a buy with only the equity flow
    assert_eq!(report.most_bought.len(), 1);
    assert_eq!(report.most_bought[0].buyer_count, 1);
    assert_eq!(report.most_bought[0].net_dollar_flow, 10_000_000.0);

    // And: Energy doubles on equity value alone
    let energy = &report.sector_rotation[0];
    assert_eq!(energy.key, "Energy");
    assert_eq!(energy.percent_change, Some(100.0));
}

// =============================================================================
// Trends: Large New Positions and Sentiment
// =============================================================================

#[test]
fn large_new_positions_are_capped_to_top_k() {
    // Given: Three entities opening new positions of $60M, $90M and $40M
    let windows = vec![
        window("alpha", Vec::new(), vec![holding("AAA000001", "AAA", 1.0, 60_000_000.0)]),
        window("beta", Vec::new(), vec![holding("BBB000001", "BBB", 1.0, 90_000_000.0)]),
        window("gamma", Vec::new(), vec![holding("CCC000001", "CCC", 1.0, 40_000_000.0)]),
    ];
    let config = EngineConfig {
        large_position_threshold: 50_000_000.0,
        large_position_top_k: 1,
        ..EngineConfig::default()
    };

    // When: Trends are aggregated
    let report = aggregate_trends(&windows, &energy_classifier(), &config);

    // Then: Only the single largest qualifying bet is kept
    assert_eq!(report.large_new_positions.len(), 1);
    assert_eq!(report.large_new_positions[0].security_id.as_str(), "BBB000001");
}

#[test]
fn sentiment_follows_reported_portfolio_value() {
    // Given: One entity growing and one with no previous holdings
    let windows = vec![
        window(
            "alpha",
            vec![holding("AAA000001", "AAA", 1_000.0, 10_000_000.0)],
            vec![holding("AAA000001", "AAA", 1_000.0, 12_000_000.0)],
        ),
        window("beta", Vec::new(), vec![holding("BBB000001", "BBB", 1.0, 5_000_000.0)]),
    ];

    // When: Trends are aggregated
    let report = aggregate_trends(&windows, &energy_classifier(), &EngineConfig::default());

    // Then: Growth reads as deploying capital and a zero base is undetermined
    assert_eq!(report.sentiment.len(), 2);
    assert_eq!(report.sentiment[0].stance, CapitalStance::DeployingCapital);
    let ratio = report.sentiment[0].ratio.expect("defined ratio");
    assert!((ratio - 0.2).abs() < 1e-12);
    assert_eq!(report.sentiment[1].ratio, None);
    assert_eq!(report.sentiment[1].stance, CapitalStance::Undetermined);
}
