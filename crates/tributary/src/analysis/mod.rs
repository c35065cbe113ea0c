//! Analyses over lineage snapshots and metric history.
//!
//! Every analyzer here is synchronous and side-effect free. Graph analyzers
//! take a `&LineageGraph` and never call a provider; series analyzers take a
//! `&MetricSeries`. The [`engine`](crate::engine) module wires them together
//! and decides what runs in parallel.

pub mod anomaly;
pub mod correlation;
pub mod critical_path;
pub mod forecast;
pub mod impact;
pub mod insight;
pub(crate) mod stats;

pub use anomaly::{Anomaly, AnomalyDetector, AnomalyKind, AnomalySensitivity};
pub use correlation::{Correlation, correlate, related_correlations};
pub use critical_path::{CriticalPath, CriticalPathDetector, CriticalPathReport, WeakestLink};
pub use forecast::{Forecast, ForecastModel, ForecastPoint, TrendForecaster};
pub use impact::{ImpactAnalyzer, ImpactReport};
pub use insight::{Evidence, Insight, InsightAggregator, InsightKind, Recommendation};
