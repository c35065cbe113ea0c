//! Configuration management for tributary.
//!
//! Every threshold the analyzers use lives here so production values can be
//! tuned without a rebuild. Configuration is stored as YAML; every section
//! falls back to its defaults when omitted.
//!
//! ```yaml
//! build:
//!   max-depth: 4
//!   fetch-timeout-ms: 2000
//! anomaly:
//!   window: 48
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::domain::{Direction, RelationshipKind};
use crate::error::{Error, Result};

/// Name of the configuration file looked up by the CLI
pub const CONFIG_FILE_NAME: &str = "tributary.yaml";

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Graph builder limits
    pub build: BuildConfig,
    /// Traversal limits
    pub traversal: TraversalConfig,
    /// Impact severity weights
    pub impact: ImpactConfig,
    /// Critical path search limits and risk thresholds
    pub critical_path: CriticalPathConfig,
    /// Anomaly detection windows and multipliers
    pub anomaly: AnomalyConfig,
    /// Forecast model parameters
    pub forecast: ForecastConfig,
    /// Insight ranking weights
    pub insight: InsightConfig,
}

/// Graph builder limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Number of relationship-fetch levels from the seed
    pub max_depth: usize,
    /// Maximum assets materialized in one snapshot
    pub max_nodes: usize,
    /// Maximum relationships materialized in one snapshot
    pub max_edges: usize,
    /// Which relationships to request for each frontier node
    pub direction: Direction,
    /// Timeout applied to every individual provider call
    pub fetch_timeout_ms: u64,
    /// Upper bound on in-flight provider calls per level
    pub max_concurrent_fetches: usize,
}

impl BuildConfig {
    /// Per-call provider timeout
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_nodes: 500,
            max_edges: 5_000,
            direction: Direction::Both,
            fetch_timeout_ms: 3_000,
            max_concurrent_fetches: 16,
        }
    }
}

/// Traversal limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TraversalConfig {
    /// Hop bound for shortest-path searches
    pub max_hops: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self { max_hops: 32 }
    }
}

/// Impact severity weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ImpactConfig {
    /// Weight of downstream assets at or above `confidential`
    pub sensitive_weight: f64,
    /// Weight of downstream assets in `error` status
    pub error_weight: f64,
    /// Relationship kinds that propagate impact
    pub kinds: Vec<RelationshipKind>,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            sensitive_weight: 0.6,
            error_weight: 0.4,
            kinds: vec![RelationshipKind::DataFlow, RelationshipKind::Dependency],
        }
    }
}

/// Critical path search limits and risk thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CriticalPathConfig {
    /// Longest path considered, in edges
    pub max_hops: usize,
    /// Shortest path reported, in edges
    pub min_hops: usize,
    /// Maximum path extensions explored before giving up
    pub path_budget: usize,
    /// Scores at or above this are low risk
    pub low_threshold: f64,
    /// Scores at or above this are medium risk
    pub medium_threshold: f64,
    /// Scores at or above this are high risk; anything lower is critical
    pub high_threshold: f64,
}

impl Default for CriticalPathConfig {
    fn default() -> Self {
        Self {
            max_hops: 10,
            min_hops: 2,
            path_budget: 10_000,
            low_threshold: 0.8,
            medium_threshold: 0.5,
            high_threshold: 0.2,
        }
    }
}

/// Anomaly detection windows and multipliers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AnomalyConfig {
    /// Trailing window for rolling statistics
    pub window: usize,
    /// Window for the short-term slope; a slope needs at least 3 points
    pub short_window: usize,
    /// Standard-deviation multiplier at low sensitivity
    pub k_low: f64,
    /// Standard-deviation multiplier at medium sensitivity
    pub k_medium: f64,
    /// Standard-deviation multiplier at high sensitivity
    pub k_high: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            window: 30,
            short_window: 7,
            k_low: 3.0,
            k_medium: 2.5,
            k_high: 2.0,
        }
    }
}

/// Forecast model parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ForecastConfig {
    /// Fewest points a forecast will run on
    pub min_points: usize,
    /// Slope t-statistic above which the trend is significant
    pub trend_t_threshold: f64,
    /// Interval multiplier (1.96 for ~95%)
    pub z: f64,
    /// Confidence reported for the first forecast step
    pub confidence: f64,
    /// Per-step multiplicative confidence decay
    pub confidence_decay: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_points: 4,
            trend_t_threshold: 2.0,
            z: 1.96,
            confidence: 0.95,
            confidence_decay: 0.95,
        }
    }
}

/// Insight ranking weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct InsightConfig {
    /// Weight of finding severity in priority
    pub severity_weight: f64,
    /// Weight of finding confidence in priority
    pub confidence_weight: f64,
    /// Weight of asset sensitivity in priority
    pub business_weight: f64,
    /// Minimum absolute Pearson r reported as a correlation insight
    pub correlation_threshold: f64,
    /// Maximum insights returned
    pub max_insights: usize,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            severity_weight: 0.5,
            confidence_weight: 0.2,
            business_weight: 0.3,
            correlation_threshold: 0.8,
            max_insights: 50,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file and validate it.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Check that every value is in range.
    pub fn validate(&self) -> Result<()> {
        if self.build.max_nodes == 0 {
            return Err(Error::Config("build.max-nodes must be at least 1".into()));
        }
        if self.build.max_concurrent_fetches == 0 {
            return Err(Error::Config(
                "build.max-concurrent-fetches must be at least 1".into(),
            ));
        }
        if self.build.fetch_timeout_ms == 0 {
            return Err(Error::Config("build.fetch-timeout-ms must be positive".into()));
        }

        let cp = &self.critical_path;
        if cp.min_hops == 0 || cp.min_hops > cp.max_hops {
            return Err(Error::Config(format!(
                "critical-path.min-hops must be between 1 and max-hops ({})",
                cp.max_hops
            )));
        }
        if !(cp.high_threshold <= cp.medium_threshold && cp.medium_threshold <= cp.low_threshold)
        {
            return Err(Error::Config(
                "critical-path thresholds must satisfy high <= medium <= low".into(),
            ));
        }

        let anomaly = &self.anomaly;
        if anomaly.window < 2 {
            return Err(Error::Config("anomaly.window must be at least 2".into()));
        }
        // Below 3 points no slope is fitted and contextual detection never fires.
        if anomaly.short_window < 3 || anomaly.short_window > anomaly.window {
            return Err(Error::Config(format!(
                "anomaly.short-window must be between 3 and window ({})",
                anomaly.window
            )));
        }
        if [anomaly.k_low, anomaly.k_medium, anomaly.k_high]
            .iter()
            .any(|k| *k <= 0.0)
        {
            return Err(Error::Config("anomaly multipliers must be positive".into()));
        }

        if self.forecast.min_points < 3 {
            return Err(Error::Config("forecast.min-points must be at least 3".into()));
        }
        if !(0.0..=1.0).contains(&self.forecast.confidence)
            || !(0.0..=1.0).contains(&self.forecast.confidence_decay)
        {
            return Err(Error::Config(
                "forecast confidence values must be within [0, 1]".into(),
            ));
        }

        let weights = [
            self.impact.sensitive_weight,
            self.impact.error_weight,
            self.insight.severity_weight,
            self.insight.confidence_weight,
            self.insight.business_weight,
        ];
        if weights.iter().any(|w| *w < 0.0) {
            return Err(Error::Config("weights must not be negative".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let yaml = "build:\n  max-depth: 7\nanomaly:\n  k-high: 1.5\n";
        let config: EngineConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.build.max_depth, 7);
        assert_eq!(config.build.max_nodes, BuildConfig::default().max_nodes);
        assert!((config.anomaly.k_high - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.anomaly.window, 30);
        assert_eq!(config.critical_path, CriticalPathConfig::default());
    }

    #[rstest]
    #[case::zero_nodes("build:\n  max-nodes: 0\n", "max-nodes")]
    #[case::min_hops_over_max("critical-path:\n  min-hops: 12\n", "min-hops")]
    #[case::thresholds_inverted("critical-path:\n  high-threshold: 0.9\n", "thresholds")]
    #[case::short_window_too_long("anomaly:\n  short-window: 40\n", "short-window")]
    #[case::short_window_too_short_to_fit("anomaly:\n  short-window: 2\n", "short-window")]
    #[case::negative_weight("insight:\n  business-weight: -1.0\n", "weights")]
    fn validate_rejects_out_of_range(#[case] yaml: &str, #[case] expected: &str) {
        let config: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(
            err.to_string().contains(expected),
            "expected '{expected}' in '{err}'"
        );
    }

    #[test]
    fn smallest_fittable_short_window_is_accepted() {
        let config: EngineConfig = serde_yaml::from_str("anomaly:\n  short-window: 3\n").unwrap();
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut original = EngineConfig::default();
        original.build.max_depth = 5;
        original.insight.max_insights = 10;
        original.save(&path).await.unwrap();

        let loaded = EngineConfig::load(&path).await.unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn load_rejects_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(&path, "build: [not, a, map]").await.unwrap();

        let result = EngineConfig::load(&path).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
