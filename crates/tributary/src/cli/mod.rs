//! CLI argument parsing and command dispatch.
//!
//! This module provides the command-line interface for tributary using clap's derive API.
//! Every command reads assets, relationships and metric history from a catalog file.
//!
//! # Commands
//!
//! - `build`: Build and print a lineage snapshot
//! - `impact`: Upstream/downstream impact of an asset
//! - `paths`: Rank critical dependency chains
//! - `anomalies`: Flag outliers in one metric series
//! - `forecast`: Project one metric series forward
//! - `insights`: Run every analysis and rank the findings
//!
//! # Global Flags
//!
//! - `--catalog`: Catalog file (YAML, or JSON by extension)
//! - `--config`: Engine configuration file
//! - `--format`: `text` or `json`
//! - `-v`: More log output (repeatable)
//!
//! # Example
//!
//! ```bash
//! tributary --catalog demos/catalog.yaml build orders_raw --depth 2
//! tributary --catalog demos/catalog.yaml paths orders_raw -k 3
//! tributary --catalog demos/catalog.yaml anomalies orders_clean --metric row_count -s high
//! tributary --catalog demos/catalog.yaml --format json insights orders_raw
//! ```

mod args;
mod execute;
mod types;
mod validators;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

// Re-export argument structs
pub use args::{
    AnomaliesArgs, BuildArgs, ForecastArgs, HistoryArgs, ImpactArgs, InsightsArgs, LineageArgs,
    PathsArgs,
};

// Re-export types
pub use types::{DirectionArg, FormatArg, GranularityArg, SensitivityArg};

// Re-export validators for external use
pub use validators::{validate_asset_id, validate_metric_name, validate_positive};

/// Tributary - data lineage analysis
///
/// Build lineage graphs from a catalog and analyze them: impact, critical
/// paths, metric anomalies, forecasts and ranked insights.
#[derive(Parser, Debug)]
#[command(name = "tributary")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Catalog file with assets, relationships and metric series
    #[arg(long, global = true, default_value = "catalog.yaml")]
    pub catalog: PathBuf,

    /// Engine configuration file (default: ./tributary.yaml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: FormatArg,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build a lineage snapshot around an asset
    ///
    /// Prints assets, relationships, boundary edges, cycles and the reasons
    /// the snapshot is incomplete, if any.
    Build(BuildArgs),

    /// Show upstream and downstream impact of an asset
    ///
    /// Severity weighs downstream assets that are sensitive or failing.
    Impact(ImpactArgs),

    /// Rank dependency chains by aggregate confidence
    ///
    /// Lower-confidence chains carry higher risk.
    Paths(PathsArgs),

    /// Flag outliers in a metric series
    Anomalies(AnomaliesArgs),

    /// Forecast a metric series
    ///
    /// Picks simple or trend-aware smoothing depending on whether the
    /// history shows a significant slope.
    Forecast(ForecastArgs),

    /// Run every analysis and rank the findings
    Insights(InsightsArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Log filter implied by `-v`, used when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "tributary=warn",
            1 => "tributary=info",
            2 => "tributary=debug",
            _ => "tributary=trace",
        }
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        use crate::output::OutputMode;

        let output_mode = match self.format {
            FormatArg::Text => OutputMode::Text,
            FormatArg::Json => OutputMode::Json,
        };

        let mut config = execute::load_config(self.config.as_deref()).await?;
        match &self.command {
            Commands::Build(args) => execute::apply_lineage_overrides(&mut config, &args.lineage),
            Commands::Impact(args) => execute::apply_lineage_overrides(&mut config, &args.lineage),
            Commands::Paths(args) => execute::apply_lineage_overrides(&mut config, &args.lineage),
            Commands::Insights(args) => {
                execute::apply_lineage_overrides(&mut config, &args.lineage);
                if let Some(limit) = args.limit {
                    config.insight.max_insights = limit;
                }
            }
            Commands::Anomalies(_) | Commands::Forecast(_) => {}
        }
        let engine = execute::open_engine(&self.catalog, config).await?;

        match &self.command {
            Commands::Build(args) => execute::execute_build(&engine, args, output_mode).await,
            Commands::Impact(args) => execute::execute_impact(&engine, args, output_mode).await,
            Commands::Paths(args) => execute::execute_paths(&engine, args, output_mode).await,
            Commands::Anomalies(args) => {
                execute::execute_anomalies(&engine, args, output_mode).await
            }
            Commands::Forecast(args) => execute::execute_forecast(&engine, args, output_mode).await,
            Commands::Insights(args) => execute::execute_insights(&engine, args, output_mode).await,
        }
    }
}
