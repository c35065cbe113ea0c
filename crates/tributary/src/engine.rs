//! Engine facade over providers, builder and analyzers.
//!
//! [`LineageEngine`] owns the two provider handles and the configuration and
//! exposes every operation callers need, from a single graph build to the
//! full pipeline in [`LineageEngine::run`].
//!
//! # Pipeline
//!
//! ```text
//! build ──► fetch series ──► spawn_blocking {
//!                               impact ∥ critical paths
//!                                      ∥
//!                               anomalies + forecasts (rayon) ─► correlations
//!                            } ──► insights
//! ```
//!
//! The snapshot is shared by `Arc` across the parallel stages; nothing in the
//! engine holds mutable state between calls.

use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::{
    Anomaly, AnomalyDetector, AnomalySensitivity, Correlation, CriticalPath, CriticalPathDetector,
    CriticalPathReport, Forecast, ImpactAnalyzer, ImpactReport, Insight, InsightAggregator,
    TrendForecaster, related_correlations,
};
use crate::cancel::CancelSignal;
use crate::config::EngineConfig;
use crate::domain::{AssetId, Direction, Granularity, MetricSeries, TimeRange};
use crate::error::{Error, ProviderError, Result};
use crate::graph::{GraphBuilder, GraphSnapshot, LineageGraph, Traversal};
use crate::provider::{MetadataProvider, MetricProvider};

/// Parameters of a full pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Asset to build lineage around
    pub seed: AssetId,
    /// Relationship levels to fetch; `build.max-depth` when `None`
    pub max_depth: Option<usize>,
    /// Asset cap; `build.max-nodes` when `None`
    pub max_nodes: Option<usize>,
    /// Number of critical paths to report
    pub top_k: usize,
    /// Anomaly sensitivity
    pub sensitivity: AnomalySensitivity,
    /// Forecast horizon in points
    pub periods: usize,
    /// Metric history to fetch
    pub range: TimeRange,
    /// Metric resolution to fetch
    pub granularity: Granularity,
}

impl AnalysisRequest {
    /// A request with default bounds over all available history.
    #[must_use]
    pub fn new(seed: impl Into<AssetId>) -> Self {
        Self {
            seed: seed.into(),
            max_depth: None,
            max_nodes: None,
            top_k: 5,
            sensitivity: AnomalySensitivity::default(),
            periods: 7,
            range: TimeRange::all(),
            granularity: Granularity::Raw,
        }
    }
}

/// Anomalies and forecasts for a batch of series, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesAnalysis {
    /// Anomalies of every series, concatenated
    pub anomalies: Vec<Anomaly>,
    /// One forecast per series
    pub forecasts: Vec<Forecast>,
}

/// A metric series that could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesFailure {
    /// Asset the series belongs to
    pub asset_id: AssetId,
    /// Metric name
    pub metric: String,
    /// Provider error or timeout, as text
    pub reason: String,
}

/// Outcome of fetching every metric series of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchedSeries {
    /// Series that arrived, ordered by asset id then metric name
    pub series: Vec<MetricSeries>,
    /// Series that failed or timed out, in the same order
    pub failures: Vec<SeriesFailure>,
}

/// Everything a full pipeline run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// The snapshot every result refers to
    pub graph: GraphSnapshot,
    /// Impact of the seed
    pub impact: ImpactReport,
    /// Critical path search outcome
    pub critical_paths: CriticalPathReport,
    /// Anomalies across every fetched series
    pub anomalies: Vec<Anomaly>,
    /// One forecast per fetched series
    pub forecasts: Vec<Forecast>,
    /// Correlations between directly related assets
    pub correlations: Vec<Correlation>,
    /// Ranked insights
    pub insights: Vec<Insight>,
    /// Series whose history never arrived. Anomalies, forecasts and
    /// correlations are silent about these, not clean.
    #[serde(default)]
    pub unavailable_series: Vec<SeriesFailure>,
}

/// Entry point for lineage queries and analyses.
#[derive(Clone)]
pub struct LineageEngine {
    metadata: Arc<dyn MetadataProvider>,
    metrics: Arc<dyn MetricProvider>,
    config: EngineConfig,
}

impl fmt::Debug for LineageEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineageEngine")
            .field("metadata", &"<dyn MetadataProvider>")
            .field("metrics", &"<dyn MetricProvider>")
            .field("config", &self.config)
            .finish()
    }
}

impl LineageEngine {
    /// Create an engine over the given providers.
    pub fn new(
        metadata: Arc<dyn MetadataProvider>,
        metrics: Arc<dyn MetricProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            metadata,
            metrics,
            config,
        }
    }

    /// Create an engine whose metadata and metrics come from one provider.
    pub fn with_provider<P>(provider: Arc<P>, config: EngineConfig) -> Self
    where
        P: MetadataProvider + MetricProvider + 'static,
    {
        Self::new(provider.clone(), provider, config)
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build a lineage snapshot around `seed`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidSeed` if the provider does not know `seed`
    /// - `Error::ProviderUnavailable` if nothing about `seed` could be fetched
    pub async fn build_lineage(
        &self,
        seed: &AssetId,
        max_depth: usize,
        max_nodes: usize,
    ) -> Result<LineageGraph> {
        self.build_lineage_with(seed, max_depth, max_nodes, &CancelSignal::never())
            .await
    }

    /// Like [`LineageEngine::build_lineage`], returning the partial snapshot
    /// if `cancel` fires.
    ///
    /// # Errors
    ///
    /// Same as [`LineageEngine::build_lineage`].
    pub async fn build_lineage_with(
        &self,
        seed: &AssetId,
        max_depth: usize,
        max_nodes: usize,
        cancel: &CancelSignal,
    ) -> Result<LineageGraph> {
        GraphBuilder::new(Arc::clone(&self.metadata), self.config.build.clone())
            .build_with(seed, max_depth, max_nodes, cancel)
            .await
    }

    /// Assets reachable from `id` within `traversal.max-hops`.
    #[must_use]
    pub fn reachable_from(
        &self,
        graph: &LineageGraph,
        id: &AssetId,
        direction: Direction,
    ) -> Vec<AssetId> {
        Traversal::new(graph)
            .reachable_from(id, direction, self.config.traversal.max_hops)
            .into_iter()
            .collect()
    }

    /// Shortest path from `from` to `to` within `traversal.max-hops`; empty
    /// if none exists.
    #[must_use]
    pub fn shortest_path(
        &self,
        graph: &LineageGraph,
        from: &AssetId,
        to: &AssetId,
        direction: Direction,
    ) -> Vec<AssetId> {
        Traversal::new(graph).shortest_path(from, to, direction, self.config.traversal.max_hops)
    }

    /// Upstream and downstream impact of `seed`.
    ///
    /// # Errors
    ///
    /// `Error::InvalidSeed` if `seed` is not in `graph`.
    pub fn get_impact(&self, graph: &LineageGraph, seed: &AssetId) -> Result<ImpactReport> {
        ImpactAnalyzer::new(self.config.impact.clone()).analyze(graph, seed)
    }

    /// The `top_k` highest-scoring dependency chains in `graph`.
    #[must_use]
    pub fn get_critical_paths(&self, graph: &LineageGraph, top_k: usize) -> CriticalPathReport {
        self.get_critical_paths_with(graph, top_k, &CancelSignal::never())
    }

    /// Like [`LineageEngine::get_critical_paths`], stopping early if `cancel`
    /// fires.
    #[must_use]
    pub fn get_critical_paths_with(
        &self,
        graph: &LineageGraph,
        top_k: usize,
        cancel: &CancelSignal,
    ) -> CriticalPathReport {
        CriticalPathDetector::new(self.config.critical_path.clone()).detect_with(graph, top_k, cancel)
    }

    /// Outliers in one series. Empty when history is too short.
    #[must_use]
    pub fn get_anomalies(
        &self,
        series: &MetricSeries,
        sensitivity: AnomalySensitivity,
    ) -> Vec<Anomaly> {
        AnomalyDetector::new(self.config.anomaly.clone()).detect(series, sensitivity)
    }

    /// Forecast `periods` points past the end of `series`.
    #[must_use]
    pub fn get_forecast(&self, series: &MetricSeries, periods: usize) -> Forecast {
        TrendForecaster::new(self.config.forecast.clone()).forecast(series, periods)
    }

    /// Merge findings about `graph` into ranked insights.
    #[must_use]
    pub fn get_insights(
        &self,
        graph: &LineageGraph,
        impact: Option<&ImpactReport>,
        paths: &[CriticalPath],
        anomalies: &[Anomaly],
        forecasts: &[Forecast],
        correlations: Vec<Correlation>,
    ) -> Vec<Insight> {
        InsightAggregator::new(graph, self.config.insight.clone())
            .with_correlations(correlations)
            .aggregate(impact, paths, anomalies, forecasts)
    }

    /// Fetch one metric series.
    ///
    /// # Errors
    ///
    /// `Error::ProviderUnavailable` if the call fails or times out.
    pub async fn get_series(
        &self,
        asset_id: &AssetId,
        metric: &str,
        range: TimeRange,
        granularity: Granularity,
    ) -> Result<MetricSeries> {
        let timeout = self.config.build.fetch_timeout();
        let call = self.metrics.get_series(asset_id, metric, range, granularity);
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(series)) => Ok(series),
            Ok(Err(e)) => Err(Error::ProviderUnavailable(e.to_string())),
            Err(_) => Err(Error::ProviderUnavailable(
                ProviderError::Timeout(timeout).to_string(),
            )),
        }
    }

    /// Fetch every metric series of every asset in `graph`.
    ///
    /// Calls run concurrently up to `build.max-concurrent-fetches`, each
    /// bounded by `build.fetch-timeout-ms`. A failed or timed out call does
    /// not abort the others; it is logged and reported in
    /// [`FetchedSeries::failures`]. Output is ordered by asset id, then
    /// metric name.
    pub async fn fetch_series(
        &self,
        graph: &LineageGraph,
        range: TimeRange,
        granularity: Granularity,
    ) -> FetchedSeries {
        let requests: Vec<(AssetId, String)> = graph
            .assets()
            .flat_map(|asset| {
                asset
                    .metric_series
                    .iter()
                    .map(move |metric| (asset.id.clone(), metric.clone()))
            })
            .collect();
        let timeout = self.config.build.fetch_timeout();

        let results: Vec<_> = stream::iter(requests)
            .map(|(asset_id, metric)| {
                let provider = Arc::clone(&self.metrics);
                async move {
                    let call = provider.get_series(&asset_id, &metric, range, granularity);
                    let result = tokio::time::timeout(timeout, call).await;
                    (asset_id, metric, result)
                }
            })
            .buffered(self.config.build.max_concurrent_fetches.max(1))
            .collect()
            .await;

        let mut fetched = FetchedSeries::default();
        for (asset_id, metric, result) in results {
            let reason = match result {
                Ok(Ok(series)) => {
                    fetched.series.push(series);
                    continue;
                }
                Ok(Err(e)) => {
                    tracing::warn!(asset = %asset_id, %metric, error = %e, "Metric fetch failed");
                    e.to_string()
                }
                Err(_) => {
                    tracing::warn!(asset = %asset_id, %metric, ?timeout, "Metric fetch timed out");
                    ProviderError::Timeout(timeout).to_string()
                }
            };
            fetched.failures.push(SeriesFailure {
                asset_id,
                metric,
                reason,
            });
        }
        fetched
    }

    /// Detect anomalies and forecast every series, in parallel on the rayon
    /// pool.
    #[must_use]
    pub fn analyze_series(
        &self,
        series: &[MetricSeries],
        sensitivity: AnomalySensitivity,
        periods: usize,
    ) -> SeriesAnalysis {
        analyze_batch(&self.config, series, sensitivity, periods)
    }

    /// Run the whole pipeline for `request`.
    ///
    /// # Errors
    ///
    /// Same as [`LineageEngine::build_lineage`], plus `Error::Task` if a
    /// background analysis task panics.
    pub async fn run(&self, request: &AnalysisRequest) -> Result<Analysis> {
        self.run_with(request, &CancelSignal::never()).await
    }

    /// Like [`LineageEngine::run`]. `cancel` interrupts the build and the
    /// critical path search; both then report truncated results.
    ///
    /// # Errors
    ///
    /// Same as [`LineageEngine::run`].
    pub async fn run_with(&self, request: &AnalysisRequest, cancel: &CancelSignal) -> Result<Analysis> {
        let max_depth = request.max_depth.unwrap_or(self.config.build.max_depth);
        let max_nodes = request.max_nodes.unwrap_or(self.config.build.max_nodes);

        let graph = Arc::new(
            self.build_lineage_with(&request.seed, max_depth, max_nodes, cancel)
                .await?,
        );
        tracing::info!(
            seed = %request.seed,
            assets = graph.node_count(),
            relationships = graph.edge_count(),
            truncated = graph.is_truncated(),
            "Lineage built"
        );

        let FetchedSeries { series, failures } = self
            .fetch_series(&graph, request.range, request.granularity)
            .await;
        tracing::info!(
            series = series.len(),
            unavailable = failures.len(),
            "Metric history fetched"
        );

        let config = self.config.clone();
        let shared = Arc::clone(&graph);
        let seed = request.seed.clone();
        let cancel = cancel.clone();
        let (top_k, sensitivity, periods) = (request.top_k, request.sensitivity, request.periods);

        let ((impact, critical_paths), (batch, correlations)) =
            tokio::task::spawn_blocking(move || {
                rayon::join(
                    || {
                        rayon::join(
                            || ImpactAnalyzer::new(config.impact.clone()).analyze(&shared, &seed),
                            || {
                                CriticalPathDetector::new(config.critical_path.clone())
                                    .detect_with(&shared, top_k, &cancel)
                            },
                        )
                    },
                    || {
                        let batch = analyze_batch(&config, &series, sensitivity, periods);
                        let correlations = related_correlations(
                            &shared,
                            &series,
                            config.insight.correlation_threshold,
                        );
                        (batch, correlations)
                    },
                )
            })
            .await
            .map_err(|e| Error::Task(e.to_string()))?;
        let impact = impact?;
        tracing::info!(
            paths = critical_paths.paths.len(),
            anomalies = batch.anomalies.len(),
            correlations = correlations.len(),
            "Analyses complete"
        );

        let insights = self.get_insights(
            &graph,
            Some(&impact),
            &critical_paths.paths,
            &batch.anomalies,
            &batch.forecasts,
            correlations.clone(),
        );
        tracing::info!(insights = insights.len(), "Insights ranked");

        Ok(Analysis {
            graph: graph.to_snapshot(),
            impact,
            critical_paths,
            anomalies: batch.anomalies,
            forecasts: batch.forecasts,
            correlations,
            insights,
            unavailable_series: failures,
        })
    }
}

fn analyze_batch(
    config: &EngineConfig,
    series: &[MetricSeries],
    sensitivity: AnomalySensitivity,
    periods: usize,
) -> SeriesAnalysis {
    let detector = AnomalyDetector::new(config.anomaly.clone());
    let forecaster = TrendForecaster::new(config.forecast.clone());

    let results: Vec<(Vec<Anomaly>, Forecast)> = series
        .par_iter()
        .map(|s| (detector.detect(s, sensitivity), forecaster.forecast(s, periods)))
        .collect();

    let mut analysis = SeriesAnalysis::default();
    for (anomalies, forecast) in results {
        analysis.anomalies.extend(anomalies);
        analysis.forecasts.push(forecast);
    }
    analysis
}
