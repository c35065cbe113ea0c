//! End-to-end tests: build, analyze and rank findings.

mod common;

use common::{cycle_catalog, engine, hourly, id, table};
use tributary::analysis::{InsightKind, Recommendation};
use tributary::domain::{Direction, Sensitivity, Severity};
use tributary::provider::InMemoryCatalog;
use tributary::AnalysisRequest;

/// The cycle catalog with a restricted sink and metric history on every asset.
fn monitored_catalog() -> InMemoryCatalog {
    let mut catalog = cycle_catalog();
    catalog.add_asset(table("C", Sensitivity::Restricted));

    catalog.add_series(hourly("A", (0..30).map(|i| 100.0 + 5.0 * f64::from(i))));
    let mut spiky = vec![50.0; 60];
    spiky[55] = 400.0;
    catalog.add_series(hourly("B", spiky));
    catalog.add_series(hourly("C", [1.0, 2.0, 3.0]));
    catalog
}

#[tokio::test]
async fn test_strongest_chain_ranks_first() {
    let engine = engine(cycle_catalog());
    let graph = engine.build_lineage(&id("A"), 3, 10).await.unwrap();

    let report = engine.get_critical_paths(&graph, 5);

    assert!(!report.truncated);
    let best = &report.paths[0];
    assert_eq!(best.assets, vec![id("A"), id("B"), id("C")]);
    assert!((best.score - 0.72).abs() < 1e-9);
    assert_eq!(best.risk_level, Severity::Medium);
    assert_eq!(best.weakest_link.source, id("B"));

    // Every chain through the 0.3 feedback edge scores lower.
    for path in &report.paths[1..] {
        let uses_feedback = path
            .assets
            .windows(2)
            .any(|pair| pair[0] == id("C") && pair[1] == id("A"));
        assert!(uses_feedback, "unexpected path {:?}", path.assets);
        assert!(path.score < best.score);
    }
}

#[tokio::test]
async fn test_impact_is_idempotent() {
    let engine = engine(monitored_catalog());
    let graph = engine.build_lineage(&id("A"), 3, 10).await.unwrap();

    let first = engine.get_impact(&graph, &id("A")).unwrap();
    let second = engine.get_impact(&graph, &id("A")).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.downstream.get(&id("B")), Some(&1));
    assert_eq!(first.downstream.get(&id("C")), Some(&2));
    assert_eq!(first.sensitive_downstream, vec![id("C")]);
    assert!(first.severity > 0.0);
}

#[tokio::test]
async fn test_traversal_queries_on_cycle() {
    let engine = engine(cycle_catalog());
    let graph = engine.build_lineage(&id("A"), 3, 10).await.unwrap();

    let reachable = engine.reachable_from(&graph, &id("A"), Direction::Outgoing);
    assert_eq!(reachable, vec![id("B"), id("C")]);

    assert_eq!(
        engine.shortest_path(&graph, &id("A"), &id("C"), Direction::Outgoing),
        vec![id("A"), id("B"), id("C")]
    );
    assert_eq!(
        engine.shortest_path(&graph, &id("A"), &id("C"), Direction::Incoming),
        vec![id("A"), id("C")]
    );
}

#[tokio::test]
async fn test_full_run_ranks_insights() {
    let engine = engine(monitored_catalog());

    let analysis = engine.run(&AnalysisRequest::new("A")).await.unwrap();

    assert_eq!(analysis.graph.assets.len(), 3);
    assert_eq!(analysis.forecasts.len(), 3);
    assert!(analysis.anomalies.iter().any(|a| a.asset_id == id("B")));
    assert!(!analysis.insights.is_empty());

    let priorities: Vec<f64> = analysis.insights.iter().map(|i| i.priority).collect();
    assert!(priorities.windows(2).all(|pair| pair[0] >= pair[1]));

    let cycle = analysis
        .insights
        .iter()
        .find(|insight| insight.id == "cycle:A,B,C")
        .unwrap();
    assert_eq!(cycle.kind, InsightKind::Pattern);
    assert!(cycle
        .recommendations
        .contains(&Recommendation::BreakFeedbackLoop));

    assert!(analysis
        .insights
        .iter()
        .any(|insight| insight.kind == InsightKind::Trend));
    assert!(analysis
        .insights
        .iter()
        .any(|insight| insight.id == "forecast:insufficient-history"));
    assert!(analysis.insights.iter().all(|insight| {
        (0.0..=1.0).contains(&insight.priority) && (0.0..=1.0).contains(&insight.confidence)
    }));
}

#[tokio::test]
async fn test_full_run_is_repeatable() {
    let engine = engine(monitored_catalog());
    let request = AnalysisRequest::new("A");

    let first = engine.run(&request).await.unwrap();
    let second = engine.run(&request).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_analysis_serializes_to_json() {
    let engine = engine(monitored_catalog());

    let analysis = engine.run(&AnalysisRequest::new("A")).await.unwrap();
    let json = serde_json::to_value(&analysis).unwrap();

    assert_eq!(json["graph"]["seed"], "A");
    assert!(json["insights"].as_array().is_some_and(|a| !a.is_empty()));
}

#[tokio::test]
async fn test_insight_limit_is_honoured() {
    let mut config = tributary::config::EngineConfig::default();
    config.insight.max_insights = 2;
    let engine = common::engine_with(monitored_catalog(), config);

    let analysis = engine.run(&AnalysisRequest::new("A")).await.unwrap();

    assert_eq!(analysis.insights.len(), 2);
}

#[tokio::test]
async fn test_failed_metric_fetch_is_reported_not_hidden() {
    let mut catalog = monitored_catalog();
    catalog.fail_series("B");
    let engine = engine(catalog);

    let analysis = engine.run(&AnalysisRequest::new("A")).await.unwrap();

    assert!(!analysis.anomalies.iter().any(|a| a.asset_id == id("B")));
    let missing: Vec<_> = analysis
        .unavailable_series
        .iter()
        .map(|f| (f.asset_id.clone(), f.metric.as_str()))
        .collect();
    assert_eq!(missing, vec![(id("B"), "rows")]);
}
