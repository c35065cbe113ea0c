//! Integration tests for building lineage snapshots through the engine.

mod common;

use std::time::Duration;

use common::{catalog, cycle_catalog, engine, engine_with, id};
use tributary::cancel::CancelSignal;
use tributary::config::EngineConfig;
use tributary::domain::{Direction, PartialReason};
use tributary::graph::{FetchOperation, TruncationReason};
use tributary::Error;

#[tokio::test]
async fn test_cycle_builds_complete_snapshot() {
    let engine = engine(cycle_catalog());

    let graph = engine.build_lineage(&id("A"), 3, 10).await.unwrap();

    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 3);
    assert!(!graph.is_truncated());
    assert!(graph.metadata().reasons.is_empty());
    assert!(graph.boundary().is_empty());
    assert_eq!(graph.cycles(), vec![vec![id("A"), id("B"), id("C")]]);
}

#[tokio::test]
async fn test_failed_asset_is_kept_as_partial() {
    // C stays reachable through A -> C while B cannot be fetched.
    let mut catalog = catalog(
        &["A", "B", "C"],
        &[("A", "B", 0.9), ("B", "C", 0.8), ("A", "C", 0.5)],
    );
    catalog.fail_asset("B");
    let engine = engine(catalog);

    let graph = engine.build_lineage(&id("A"), 3, 10).await.unwrap();

    assert!(graph.contains(&id("A")));
    assert!(graph.contains(&id("C")));
    let b = graph.get_asset(&id("B")).unwrap();
    assert!(b.is_partial());
    assert_eq!(b.partial, Some(PartialReason::AssetUnavailable));
    assert!(!graph.get_asset(&id("C")).unwrap().is_partial());

    let metadata = graph.metadata();
    assert!(metadata.truncated);
    assert!(metadata.reasons.contains(&TruncationReason::PartialFetch {
        assets: vec![id("B")]
    }));
    assert!(metadata
        .failures
        .iter()
        .all(|failure| failure.asset_id == id("B")));
    assert!(metadata
        .failures
        .iter()
        .any(|failure| failure.operation == FetchOperation::Asset));
}

#[tokio::test]
async fn test_node_limit_keeps_boundary_edges() {
    let engine = engine(catalog(
        &["A", "B", "C", "D"],
        &[("A", "B", 1.0), ("B", "C", 1.0), ("C", "D", 1.0)],
    ));

    let graph = engine.build_lineage(&id("A"), 5, 2).await.unwrap();

    assert_eq!(graph.node_count(), 2);
    assert!(graph
        .metadata()
        .reasons
        .contains(&TruncationReason::NodeLimit { limit: 2 }));
    assert_eq!(graph.boundary().len(), 1);
    assert_eq!(graph.boundary()[0].source, id("B"));
    assert_eq!(graph.boundary()[0].target, id("C"));
}

#[tokio::test]
async fn test_edge_limit_truncates() {
    let mut config = EngineConfig::default();
    config.build.max_edges = 2;
    let engine = engine_with(
        catalog(
            &["A", "B", "C", "D"],
            &[("A", "B", 1.0), ("A", "C", 1.0), ("A", "D", 1.0)],
        ),
        config,
    );

    let graph = engine.build_lineage(&id("A"), 3, 10).await.unwrap();

    assert_eq!(graph.edge_count(), 2);
    assert!(graph
        .metadata()
        .reasons
        .contains(&TruncationReason::EdgeLimit { limit: 2 }));
}

#[tokio::test]
async fn test_depth_zero_returns_seed_only() {
    let engine = engine(cycle_catalog());

    let graph = engine.build_lineage(&id("A"), 0, 10).await.unwrap();

    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.edge_count(), 0);
    assert_eq!(graph.depth_reached(), 0);
    assert!(!graph.is_truncated());
}

#[tokio::test]
async fn test_direction_limits_expansion() {
    let mut config = EngineConfig::default();
    config.build.direction = Direction::Incoming;
    let engine = engine_with(
        catalog(&["up", "A", "down"], &[("up", "A", 1.0), ("A", "down", 1.0)]),
        config,
    );

    let graph = engine.build_lineage(&id("A"), 3, 10).await.unwrap();

    assert!(graph.contains(&id("up")));
    assert!(!graph.contains(&id("down")));
}

#[tokio::test]
async fn test_unknown_seed_is_rejected() {
    let engine = engine(cycle_catalog());

    let result = engine.build_lineage(&id("missing"), 3, 10).await;

    assert!(matches!(result, Err(Error::InvalidSeed(seed)) if seed == id("missing")));
}

#[tokio::test]
async fn test_total_outage_is_an_error() {
    let mut catalog = cycle_catalog();
    catalog.set_unavailable(true);
    let engine = engine(catalog);

    let result = engine.build_lineage(&id("A"), 3, 10).await;

    assert!(matches!(result, Err(Error::ProviderUnavailable(_))));
}

#[tokio::test]
async fn test_cancelled_build_returns_what_it_has() {
    let engine = engine(cycle_catalog());
    let (handle, signal) = CancelSignal::pair();
    handle.cancel();

    let graph = engine
        .build_lineage_with(&id("A"), 3, 10, &signal)
        .await
        .unwrap();

    assert_eq!(graph.node_count(), 1);
    assert!(graph.is_truncated());
    assert!(graph
        .metadata()
        .reasons
        .contains(&TruncationReason::Cancelled));
}

#[tokio::test]
async fn test_deadline_interrupts_slow_provider() {
    let slow = cycle_catalog().with_latency(Duration::from_millis(200));
    let engine = engine(slow);
    let signal = CancelSignal::never().with_timeout(Duration::from_millis(20));

    let graph = engine
        .build_lineage_with(&id("A"), 3, 10, &signal)
        .await
        .unwrap();

    assert!(graph.is_truncated());
    assert!(graph
        .metadata()
        .reasons
        .contains(&TruncationReason::DeadlineExceeded));
    assert!(graph.node_count() <= 1);
}

#[tokio::test]
async fn test_builds_are_deterministic() {
    let engine = engine(catalog(
        &["A", "B", "C", "D", "E"],
        &[
            ("A", "B", 0.9),
            ("A", "C", 0.7),
            ("B", "D", 0.6),
            ("C", "D", 0.8),
            ("D", "E", 0.5),
        ],
    ));

    let first = engine.build_lineage(&id("A"), 3, 10).await.unwrap();
    let second = engine.build_lineage(&id("A"), 3, 10).await.unwrap();

    assert_eq!(first.to_snapshot(), second.to_snapshot());
}
