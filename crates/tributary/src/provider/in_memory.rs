//! In-memory metadata and metric provider.
//!
//! [`InMemoryCatalog`] holds assets, relationships and metric series in
//! `HashMap`s and answers both provider traits from them. It backs the CLI
//! (loaded from a YAML or JSON catalog file) and the test suites.
//!
//! # Fault injection
//!
//! Real providers fail. The catalog can simulate that:
//! - [`InMemoryCatalog::fail_asset`]: every call about one asset errors
//! - [`InMemoryCatalog::fail_relationships`]: only relationship calls about one asset error
//! - [`InMemoryCatalog::fail_series`]: only metric calls about one asset error
//! - [`InMemoryCatalog::set_unavailable`]: every call errors (global outage)
//! - [`InMemoryCatalog::with_latency`]: every call sleeps first, to exercise timeouts

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

use super::{MetadataProvider, MetricProvider};
use crate::domain::{
    AssetId, AssetRecord, Direction, Granularity, MetricSeries, RelationshipRecord, TimeRange,
};
use crate::error::{Error, ProviderError, Result};

/// On-disk catalog layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogFile {
    /// Asset records
    pub assets: Vec<AssetRecord>,
    /// Relationship records
    pub relationships: Vec<RelationshipRecord>,
    /// Metric history
    pub series: Vec<MetricSeries>,
}

/// Provider backed by in-memory maps.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    assets: HashMap<AssetId, AssetRecord>,
    relationships: Vec<RelationshipRecord>,
    outgoing: HashMap<AssetId, Vec<usize>>,
    incoming: HashMap<AssetId, Vec<usize>>,
    series: HashMap<(AssetId, String), MetricSeries>,
    failing_assets: HashSet<AssetId>,
    failing_relationships: HashSet<AssetId>,
    failing_series: HashSet<AssetId>,
    unavailable: bool,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl InMemoryCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from parsed file contents.
    #[must_use]
    pub fn from_catalog(file: CatalogFile) -> Self {
        let mut catalog = Self::new();
        for asset in file.assets {
            catalog.add_asset(asset);
        }
        for relationship in file.relationships {
            catalog.add_relationship(relationship);
        }
        for series in file.series {
            catalog.add_series(series);
        }
        catalog
    }

    /// Load a catalog file. `.json` files are parsed as JSON, anything else as YAML.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let file: CatalogFile = if is_json {
            serde_json::from_str(&content).map_err(|e| Error::Catalog(e.to_string()))?
        } else {
            serde_yaml::from_str(&content).map_err(|e| Error::Catalog(e.to_string()))?
        };

        tracing::debug!(
            path = %path.display(),
            assets = file.assets.len(),
            relationships = file.relationships.len(),
            series = file.series.len(),
            "Loaded catalog"
        );
        Ok(Self::from_catalog(file))
    }

    /// Insert or replace an asset record
    pub fn add_asset(&mut self, asset: AssetRecord) {
        self.assets.insert(asset.id.clone(), asset);
    }

    /// Append a relationship record. Duplicates are kept, as a real provider might return them.
    pub fn add_relationship(&mut self, relationship: RelationshipRecord) {
        let index = self.relationships.len();
        self.outgoing
            .entry(relationship.source.clone())
            .or_default()
            .push(index);
        self.incoming
            .entry(relationship.target.clone())
            .or_default()
            .push(index);
        self.relationships.push(relationship);
    }

    /// Insert or replace a metric series
    pub fn add_series(&mut self, series: MetricSeries) {
        let series = MetricSeries::new(series.asset_id, series.metric, series.points);
        self.series
            .insert((series.asset_id.clone(), series.metric.clone()), series);
    }

    /// Make every call about `id` fail with a transient error.
    pub fn fail_asset(&mut self, id: impl Into<AssetId>) {
        self.failing_assets.insert(id.into());
    }

    /// Make relationship calls about `id` fail with a transient error.
    pub fn fail_relationships(&mut self, id: impl Into<AssetId>) {
        self.failing_relationships.insert(id.into());
    }

    /// Make metric calls about `id` fail with a transient error.
    pub fn fail_series(&mut self, id: impl Into<AssetId>) {
        self.failing_series.insert(id.into());
    }

    /// Simulate a complete provider outage.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of provider calls served so far, including failed ones.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every asset record, sorted by id.
    #[must_use]
    pub fn assets(&self) -> Vec<&AssetRecord> {
        let mut assets: Vec<_> = self.assets.values().collect();
        assets.sort_by(|a, b| a.id.cmp(&b.id));
        assets
    }

    async fn enter(&self, id: &AssetId) -> std::result::Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable {
            return Err(ProviderError::Transient("catalog unavailable".into()));
        }
        if self.failing_assets.contains(id) {
            return Err(ProviderError::Transient(format!("injected failure for {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataProvider for InMemoryCatalog {
    async fn get_asset(&self, id: &AssetId) -> std::result::Result<AssetRecord, ProviderError> {
        self.enter(id).await?;
        self.assets
            .get(id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(id.clone()))
    }

    async fn get_relationships(
        &self,
        id: &AssetId,
        direction: Direction,
    ) -> std::result::Result<Vec<RelationshipRecord>, ProviderError> {
        self.enter(id).await?;
        if self.failing_relationships.contains(id) {
            return Err(ProviderError::Transient(format!(
                "injected relationship failure for {id}"
            )));
        }
        if !self.assets.contains_key(id) {
            return Err(ProviderError::NotFound(id.clone()));
        }

        let mut indices: Vec<usize> = Vec::new();
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            indices.extend(self.outgoing.get(id).into_iter().flatten());
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            indices.extend(self.incoming.get(id).into_iter().flatten());
        }
        indices.sort_unstable();
        indices.dedup();

        Ok(indices
            .into_iter()
            .map(|i| self.relationships[i].clone())
            .collect())
    }
}

#[async_trait]
impl MetricProvider for InMemoryCatalog {
    async fn get_series(
        &self,
        asset_id: &AssetId,
        metric: &str,
        range: TimeRange,
        granularity: Granularity,
    ) -> std::result::Result<MetricSeries, ProviderError> {
        self.enter(asset_id).await?;
        if self.failing_series.contains(asset_id) {
            return Err(ProviderError::Transient(format!(
                "injected metric failure for {asset_id}"
            )));
        }
        let series = self
            .series
            .get(&(asset_id.clone(), metric.to_string()))
            .map_or_else(
                || MetricSeries::empty(asset_id.clone(), metric),
                |series| series.within(&range).resample(granularity),
            );
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetKind, AssetStatus, RelationshipKind, Sensitivity};
    use chrono::{DateTime, Utc};
    use tempfile::TempDir;

    fn asset(id: &str) -> AssetRecord {
        AssetRecord {
            id: AssetId::new(id),
            kind: AssetKind::Table,
            status: AssetStatus::Active,
            sensitivity: Sensitivity::Internal,
            metrics: vec!["rows".into()],
        }
    }

    fn edge(source: &str, target: &str) -> RelationshipRecord {
        RelationshipRecord {
            source: AssetId::new(source),
            target: AssetId::new(target),
            kind: RelationshipKind::DataFlow,
            confidence: 0.9,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn chain() -> InMemoryCatalog {
        let mut catalog = InMemoryCatalog::new();
        for id in ["a", "b", "c"] {
            catalog.add_asset(asset(id));
        }
        catalog.add_relationship(edge("a", "b"));
        catalog.add_relationship(edge("b", "c"));
        catalog
    }

    #[tokio::test]
    async fn relationships_respect_direction() {
        let catalog = chain();
        let b = AssetId::new("b");

        let out = catalog.get_relationships(&b, Direction::Outgoing).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target, AssetId::new("c"));

        let incoming = catalog.get_relationships(&b, Direction::Incoming).await.unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].source, AssetId::new("a"));

        let both = catalog.get_relationships(&b, Direction::Both).await.unwrap();
        assert_eq!(both.len(), 2);
    }

    #[tokio::test]
    async fn unknown_asset_is_not_found() {
        let catalog = chain();
        let result = catalog.get_asset(&AssetId::new("zzz")).await;
        assert_eq!(result, Err(ProviderError::NotFound(AssetId::new("zzz"))));
    }

    #[tokio::test]
    async fn injected_failures_are_transient() {
        let mut catalog = chain();
        catalog.fail_relationships("b");

        assert!(catalog.get_asset(&AssetId::new("b")).await.is_ok());
        let err = catalog
            .get_relationships(&AssetId::new("b"), Direction::Both)
            .await
            .unwrap_err();
        assert!(err.is_transient());

        catalog.set_unavailable(true);
        assert!(catalog.get_asset(&AssetId::new("a")).await.is_err());
        assert_eq!(catalog.call_count(), 3);
    }

    #[tokio::test]
    async fn series_failure_leaves_metadata_readable() {
        let mut catalog = chain();
        catalog.fail_series("b");

        assert!(catalog.get_asset(&AssetId::new("b")).await.is_ok());
        let err = catalog
            .get_series(&AssetId::new("b"), "rows", TimeRange::all(), Granularity::Raw)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(catalog
            .get_series(&AssetId::new("a"), "rows", TimeRange::all(), Granularity::Raw)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn missing_series_is_empty_not_error() {
        let catalog = chain();
        let series = catalog
            .get_series(&AssetId::new("a"), "latency", TimeRange::all(), Granularity::Raw)
            .await
            .unwrap();
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn load_reads_yaml_catalog() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.yaml");
        let yaml = r"
assets:
  - id: orders
    kind: table
    status: active
    sensitivity: confidential
    metrics: [rows]
  - id: revenue
    kind: dashboard
    status: error
    sensitivity: restricted
relationships:
  - source: orders
    target: revenue
    kind: data_flow
    confidence: 0.8
    last_updated: 2026-01-01T00:00:00Z
series:
  - asset_id: orders
    metric: rows
    points:
      - { timestamp: 2026-01-02T00:00:00Z, value: 2.0 }
      - { timestamp: 2026-01-01T00:00:00Z, value: 1.0 }
";
        tokio::fs::write(&path, yaml).await.unwrap();

        let catalog = InMemoryCatalog::load(&path).await.unwrap();

        assert_eq!(catalog.assets().len(), 2);
        let series = catalog
            .get_series(&AssetId::new("orders"), "rows", TimeRange::all(), Granularity::Raw)
            .await
            .unwrap();
        assert_eq!(series.values(), vec![1.0, 2.0]);
        assert_eq!(
            series.points[0].timestamp,
            "2026-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[tokio::test]
    async fn load_rejects_malformed_catalog() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let result = InMemoryCatalog::load(&path).await;
        assert!(matches!(result, Err(Error::Catalog(_))));
    }
}
