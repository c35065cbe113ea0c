//! CLI argument structs for all commands.
//!
//! Commands that build a lineage snapshot share [`LineageArgs`]; commands that
//! read metric history share [`HistoryArgs`].

use clap::{Args, Parser};

use super::types::{DirectionArg, GranularityArg, SensitivityArg};
use super::validators::{validate_asset_id, validate_metric_name, validate_positive};

/// Snapshot bounds shared by every graph command
#[derive(Args, Debug, Clone)]
pub struct LineageArgs {
    /// Asset to build lineage around
    #[arg(value_parser = validate_asset_id)]
    pub seed: String,

    /// Relationship levels to fetch (default from config)
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Maximum assets in the snapshot (default from config)
    #[arg(long, value_parser = validate_positive)]
    pub max_nodes: Option<usize>,

    /// Which relationships to follow while building
    #[arg(long, value_enum)]
    pub direction: Option<DirectionArg>,

    /// Give up on the build after this many milliseconds and report what was found
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub deadline_ms: Option<u64>,
}

/// Metric history selection
#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// Only use history from the last N days
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub since_days: Option<u32>,

    /// Resample history to this resolution
    #[arg(long, value_enum, default_value = "raw")]
    pub granularity: GranularityArg,
}

/// Arguments for the `build` command
#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    /// Snapshot bounds
    #[command(flatten)]
    pub lineage: LineageArgs,
}

/// Arguments for the `impact` command
#[derive(Parser, Debug, Clone)]
pub struct ImpactArgs {
    /// Snapshot bounds
    #[command(flatten)]
    pub lineage: LineageArgs,

    /// Report impact of this asset instead of the seed
    #[arg(long, value_parser = validate_asset_id)]
    pub target: Option<String>,
}

/// Arguments for the `paths` command
#[derive(Parser, Debug, Clone)]
pub struct PathsArgs {
    /// Snapshot bounds
    #[command(flatten)]
    pub lineage: LineageArgs,

    /// Number of paths to report
    #[arg(short = 'k', long, default_value = "5", value_parser = validate_positive)]
    pub top_k: usize,
}

/// Arguments for the `anomalies` command
#[derive(Parser, Debug, Clone)]
pub struct AnomaliesArgs {
    /// Asset owning the metric
    #[arg(value_parser = validate_asset_id)]
    pub asset: String,

    /// Metric name
    #[arg(short, long, value_parser = validate_metric_name)]
    pub metric: String,

    /// How eagerly to flag outliers
    #[arg(short, long, value_enum, default_value = "medium")]
    pub sensitivity: SensitivityArg,

    /// History selection
    #[command(flatten)]
    pub history: HistoryArgs,
}

/// Arguments for the `forecast` command
#[derive(Parser, Debug, Clone)]
pub struct ForecastArgs {
    /// Asset owning the metric
    #[arg(value_parser = validate_asset_id)]
    pub asset: String,

    /// Metric name
    #[arg(short, long, value_parser = validate_metric_name)]
    pub metric: String,

    /// Number of points to project
    #[arg(short, long, default_value = "7", value_parser = validate_positive)]
    pub periods: usize,

    /// History selection
    #[command(flatten)]
    pub history: HistoryArgs,
}

/// Arguments for the `insights` command
#[derive(Parser, Debug, Clone)]
pub struct InsightsArgs {
    /// Snapshot bounds
    #[command(flatten)]
    pub lineage: LineageArgs,

    /// History selection
    #[command(flatten)]
    pub history: HistoryArgs,

    /// Critical paths to consider
    #[arg(short = 'k', long, default_value = "5", value_parser = validate_positive)]
    pub top_k: usize,

    /// Anomaly sensitivity
    #[arg(short, long, value_enum, default_value = "medium")]
    pub sensitivity: SensitivityArg,

    /// Forecast horizon in points
    #[arg(short, long, default_value = "7", value_parser = validate_positive)]
    pub periods: usize,

    /// Maximum insights to show (default from config)
    #[arg(short, long, value_parser = validate_positive)]
    pub limit: Option<usize>,
}
