//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tributary::config::EngineConfig;
use tributary::domain::{
    AssetId, AssetKind, AssetRecord, AssetStatus, MetricPoint, MetricSeries, RelationshipKind,
    RelationshipRecord, Sensitivity,
};
use tributary::provider::InMemoryCatalog;
use tributary::LineageEngine;

/// Shorthand for an asset id
pub fn id(raw: &str) -> AssetId {
    AssetId::new(raw)
}

/// An active table with one `rows` metric
pub fn table(raw: &str, sensitivity: Sensitivity) -> AssetRecord {
    AssetRecord {
        id: id(raw),
        kind: AssetKind::Table,
        status: AssetStatus::Active,
        sensitivity,
        metrics: vec!["rows".into()],
    }
}

/// A data-flow relationship
pub fn flow(source: &str, target: &str, confidence: f64) -> RelationshipRecord {
    RelationshipRecord {
        source: id(source),
        target: id(target),
        kind: RelationshipKind::DataFlow,
        confidence,
        last_updated: DateTime::<Utc>::UNIX_EPOCH,
    }
}

/// Hourly `rows` history for `raw`, starting at the epoch
pub fn hourly(raw: &str, values: impl IntoIterator<Item = f64>) -> MetricSeries {
    let start = DateTime::<Utc>::UNIX_EPOCH;
    let points = values
        .into_iter()
        .zip(0_i64..)
        .map(|(value, hour)| MetricPoint::new(start + Duration::hours(hour), value))
        .collect();
    MetricSeries::new(id(raw), "rows", points)
}

/// Catalog with `assets` (all internal tables) and the given edges
pub fn catalog(assets: &[&str], edges: &[(&str, &str, f64)]) -> InMemoryCatalog {
    let mut catalog = InMemoryCatalog::new();
    for raw in assets {
        catalog.add_asset(table(raw, Sensitivity::Internal));
    }
    for (source, target, confidence) in edges {
        catalog.add_relationship(flow(source, target, *confidence));
    }
    catalog
}

/// The pipeline cycle: A -> B (0.9), B -> C (0.8), C -> A (0.3)
pub fn cycle_catalog() -> InMemoryCatalog {
    catalog(
        &["A", "B", "C"],
        &[("A", "B", 0.9), ("B", "C", 0.8), ("C", "A", 0.3)],
    )
}

/// Engine over `catalog` with default configuration
pub fn engine(catalog: InMemoryCatalog) -> LineageEngine {
    engine_with(catalog, EngineConfig::default())
}

/// Engine over `catalog` with `config`
pub fn engine_with(catalog: InMemoryCatalog, config: EngineConfig) -> LineageEngine {
    LineageEngine::with_provider(Arc::new(catalog), config)
}
