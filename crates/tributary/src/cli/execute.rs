//! Command execution logic.
//!
//! This module contains the implementation of all CLI commands.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use super::args::{
    AnomaliesArgs, BuildArgs, ForecastArgs, HistoryArgs, ImpactArgs, InsightsArgs, LineageArgs,
    PathsArgs,
};
use crate::cancel::CancelSignal;
use crate::config::{CONFIG_FILE_NAME, EngineConfig};
use crate::domain::{AssetId, TimeRange};
use crate::engine::{AnalysisRequest, LineageEngine};
use crate::graph::LineageGraph;
use crate::output::{self, OutputMode};
use crate::provider::InMemoryCatalog;

/// Load configuration from `path`, or from `tributary.yaml` in the working
/// directory if present, or fall back to defaults.
pub async fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    if let Some(path) = path {
        return EngineConfig::load(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    let local = Path::new(CONFIG_FILE_NAME);
    if tokio::fs::try_exists(local).await.unwrap_or(false) {
        tracing::debug!(path = %local.display(), "Using local config");
        return EngineConfig::load(local)
            .await
            .with_context(|| format!("Failed to load config from {}", local.display()));
    }
    Ok(EngineConfig::default())
}

/// Open the catalog at `path` as the engine's provider.
pub async fn open_engine(catalog: &Path, config: EngineConfig) -> Result<LineageEngine> {
    let catalog = InMemoryCatalog::load(catalog)
        .await
        .with_context(|| format!("Failed to load catalog from {}", catalog.display()))?;
    Ok(LineageEngine::with_provider(Arc::new(catalog), config))
}

/// Apply per-command overrides to the loaded configuration.
pub(crate) fn apply_lineage_overrides(config: &mut EngineConfig, args: &LineageArgs) {
    if let Some(direction) = args.direction {
        config.build.direction = direction.into();
    }
}

fn cancel_signal(args: &LineageArgs) -> CancelSignal {
    match args.deadline_ms {
        Some(ms) => CancelSignal::never().with_timeout(Duration::from_millis(ms)),
        None => CancelSignal::never(),
    }
}

fn time_range(args: &HistoryArgs) -> TimeRange {
    match args.since_days {
        Some(days) => chrono::Duration::try_days(i64::from(days))
            .map_or_else(TimeRange::all, TimeRange::last),
        None => TimeRange::all(),
    }
}

async fn build(engine: &LineageEngine, args: &LineageArgs) -> Result<LineageGraph> {
    let defaults = &engine.config().build;
    let seed = AssetId::new(&args.seed);
    let depth = args.depth.unwrap_or(defaults.max_depth);
    let max_nodes = args.max_nodes.unwrap_or(defaults.max_nodes);

    let graph = engine
        .build_lineage_with(&seed, depth, max_nodes, &cancel_signal(args))
        .await?;
    if graph.is_truncated() {
        tracing::warn!(
            seed = %seed,
            reasons = ?graph.metadata().reasons,
            "Lineage snapshot is incomplete"
        );
    }
    Ok(graph)
}

/// Execute the build command
pub async fn execute_build(engine: &LineageEngine, args: &BuildArgs, mode: OutputMode) -> Result<()> {
    let graph = build(engine, &args.lineage).await?;
    match mode {
        OutputMode::Text => output::print_text(|w, c| output::write_graph(w, &graph, c))?,
        OutputMode::Json => output::print_json(&graph.to_snapshot())?,
    }
    Ok(())
}

/// Execute the impact command
pub async fn execute_impact(
    engine: &LineageEngine,
    args: &ImpactArgs,
    mode: OutputMode,
) -> Result<()> {
    let graph = build(engine, &args.lineage).await?;
    let target = AssetId::new(args.target.as_deref().unwrap_or(&args.lineage.seed));
    let report = engine.get_impact(&graph, &target)?;
    match mode {
        OutputMode::Text => output::print_text(|w, c| output::write_impact(w, &report, c))?,
        OutputMode::Json => output::print_json(&report)?,
    }
    Ok(())
}

/// Execute the paths command
pub async fn execute_paths(engine: &LineageEngine, args: &PathsArgs, mode: OutputMode) -> Result<()> {
    let graph = build(engine, &args.lineage).await?;
    let report = engine.get_critical_paths_with(&graph, args.top_k, &cancel_signal(&args.lineage));
    match mode {
        OutputMode::Text => output::print_text(|w, c| output::write_paths(w, &report, c))?,
        OutputMode::Json => output::print_json(&report)?,
    }
    Ok(())
}

/// Execute the anomalies command
pub async fn execute_anomalies(
    engine: &LineageEngine,
    args: &AnomaliesArgs,
    mode: OutputMode,
) -> Result<()> {
    let asset = AssetId::new(&args.asset);
    let series = engine
        .get_series(
            &asset,
            &args.metric,
            time_range(&args.history),
            args.history.granularity.into(),
        )
        .await?;
    if series.is_empty() {
        tracing::warn!(asset = %asset, metric = %args.metric, "No history found");
    }

    let anomalies = engine.get_anomalies(&series, args.sensitivity.into());
    match mode {
        OutputMode::Text => output::print_text(|w, c| output::write_anomalies(w, &anomalies, c))?,
        OutputMode::Json => output::print_json(&anomalies)?,
    }
    Ok(())
}

/// Execute the forecast command
pub async fn execute_forecast(
    engine: &LineageEngine,
    args: &ForecastArgs,
    mode: OutputMode,
) -> Result<()> {
    let asset = AssetId::new(&args.asset);
    let series = engine
        .get_series(
            &asset,
            &args.metric,
            time_range(&args.history),
            args.history.granularity.into(),
        )
        .await?;

    let forecast = engine.get_forecast(&series, args.periods);
    match mode {
        OutputMode::Text => output::print_text(|w, c| output::write_forecast(w, &forecast, c))?,
        OutputMode::Json => output::print_json(&forecast)?,
    }
    Ok(())
}

/// Execute the insights command
pub async fn execute_insights(
    engine: &LineageEngine,
    args: &InsightsArgs,
    mode: OutputMode,
) -> Result<()> {
    let request = AnalysisRequest {
        seed: AssetId::new(&args.lineage.seed),
        max_depth: args.lineage.depth,
        max_nodes: args.lineage.max_nodes,
        top_k: args.top_k,
        sensitivity: args.sensitivity.into(),
        periods: args.periods,
        range: time_range(&args.history),
        granularity: args.history.granularity.into(),
    };
    let analysis = engine
        .run_with(&request, &cancel_signal(&args.lineage))
        .await?;
    for failure in &analysis.unavailable_series {
        tracing::warn!(
            asset = %failure.asset_id,
            metric = %failure.metric,
            reason = %failure.reason,
            "Metric history unavailable; insights may be incomplete"
        );
    }

    match mode {
        OutputMode::Text => {
            output::print_text(|w, c| output::write_insights(w, &analysis.insights, c))?;
        }
        OutputMode::Json => output::print_json(&analysis)?,
    }
    Ok(())
}
