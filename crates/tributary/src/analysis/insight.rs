//! Ranked, deduplicated insights over every analysis output.
//!
//! The aggregator is a pure function of its inputs. It never formats prose;
//! each insight carries structured evidence and a closed set of
//! [`Recommendation`]s for a presentation layer to render.
//!
//! ## Deduplication
//!
//! Anomalies are grouped per (asset, metric). A group whose asset lies on a
//! critical path of `High` risk or worse is attached to that path's insight
//! as extra evidence instead of producing an insight of its own.
//!
//! ## Priority
//!
//! ```text
//! priority = (ws * severity + wc * confidence + wb * business) / (ws + wc + wb)
//! ```
//!
//! `business` is the highest sensitivity weight among the affected assets.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::anomaly::{Anomaly, AnomalyKind};
use super::correlation::Correlation;
use super::critical_path::CriticalPath;
use super::forecast::{Forecast, ForecastModel};
use super::impact::ImpactReport;
use crate::config::InsightConfig;
use crate::domain::{AssetId, Sensitivity, Severity};
use crate::graph::LineageGraph;

/// Category of an insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    /// A metric is trending
    Trend,
    /// A structural finding in the lineage graph
    Pattern,
    /// Two related metrics move together
    Correlation,
    /// An outlier in metric history
    Anomaly,
    /// A projection without a significant trend
    Forecast,
}

impl fmt::Display for InsightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trend => write!(f, "trend"),
            Self::Pattern => write!(f, "pattern"),
            Self::Correlation => write!(f, "correlation"),
            Self::Anomaly => write!(f, "anomaly"),
            Self::Forecast => write!(f, "forecast"),
        }
    }
}

/// Suggested follow-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// Notify owners of affected downstream assets
    ReviewDownstreamConsumers,
    /// Confirm or repair low-confidence relationships
    StrengthenLineage,
    /// Look into flagged observations
    InvestigateAnomaly,
    /// Watch a trending metric
    MonitorTrend,
    /// Too little history; keep collecting
    CollectMoreHistory,
    /// A feedback loop exists in the lineage
    BreakFeedbackLoop,
    /// Check whether related metrics share a cause
    ReviewCorrelatedAssets,
}

/// Reference to the finding an insight is based on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Evidence {
    /// An impact report
    Impact {
        /// Asset analyzed
        seed_id: AssetId,
        /// Upstream asset count
        upstream: usize,
        /// Downstream asset count
        downstream: usize,
        /// Severity score
        severity: f64,
    },
    /// A critical path
    CriticalPath {
        /// Assets on the path
        assets: Vec<AssetId>,
        /// Path score
        score: f64,
        /// Path risk
        risk_level: Severity,
    },
    /// A flagged observation
    Anomaly {
        /// Asset the metric belongs to
        asset_id: AssetId,
        /// Metric name
        metric_name: String,
        /// Observation time
        timestamp: DateTime<Utc>,
        /// Signed deviation
        deviation: f64,
        /// Detector that flagged it
        kind: AnomalyKind,
    },
    /// A forecast
    Forecast {
        /// Asset the metric belongs to
        asset_id: AssetId,
        /// Metric name
        metric_name: String,
        /// Selected model
        model: ForecastModel,
        /// Historical slope per point
        slope: f64,
        /// Number of projected points
        horizon: usize,
    },
    /// A correlation between related assets
    Correlation {
        /// Upstream asset
        source: AssetId,
        /// Downstream asset
        target: AssetId,
        /// Pearson r
        coefficient: f64,
    },
    /// A feedback loop
    Cycle {
        /// Assets in the loop
        assets: Vec<AssetId>,
    },
}

/// A ranked finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// Stable id derived from the subject of the insight
    pub id: String,
    /// Category
    pub kind: InsightKind,
    /// Ranking score in [0, 1]
    pub priority: f64,
    /// Severity of the underlying finding
    pub severity: Severity,
    /// Confidence in the underlying finding, in [0, 1]
    pub confidence: f64,
    /// Assets the insight concerns, sorted
    pub affected_asset_ids: Vec<AssetId>,
    /// Findings the insight is based on
    pub evidence: Vec<Evidence>,
    /// Suggested follow-ups, sorted
    pub recommendations: Vec<Recommendation>,
}

impl Insight {
    fn new(id: String, kind: InsightKind, severity: Severity, confidence: f64) -> Self {
        Self {
            id,
            kind,
            priority: 0.0,
            severity,
            confidence: confidence.clamp(0.0, 1.0),
            affected_asset_ids: Vec::new(),
            evidence: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    fn affecting(mut self, ids: impl IntoIterator<Item = AssetId>) -> Self {
        self.affected_asset_ids.extend(ids);
        self.affected_asset_ids.sort();
        self.affected_asset_ids.dedup();
        self
    }

    fn recommend(mut self, recommendation: Recommendation) -> Self {
        self.add_recommendation(recommendation);
        self
    }

    fn add_recommendation(&mut self, recommendation: Recommendation) {
        if !self.recommendations.contains(&recommendation) {
            self.recommendations.push(recommendation);
            self.recommendations.sort();
        }
    }
}

/// Merges analysis outputs over one snapshot into ranked insights.
#[derive(Debug, Clone)]
pub struct InsightAggregator<'g> {
    graph: &'g LineageGraph,
    config: InsightConfig,
    correlations: Vec<Correlation>,
}

impl<'g> InsightAggregator<'g> {
    /// Create an aggregator for findings about `graph`.
    #[must_use]
    pub fn new(graph: &'g LineageGraph, config: InsightConfig) -> Self {
        Self {
            graph,
            config,
            correlations: Vec::new(),
        }
    }

    /// Include correlation findings.
    #[must_use]
    pub fn with_correlations(mut self, correlations: Vec<Correlation>) -> Self {
        self.correlations = correlations;
        self
    }

    /// Merge findings into at most `max_insights` insights, highest priority
    /// first. Ties are ordered by id.
    #[must_use]
    pub fn aggregate(
        &self,
        impact: Option<&ImpactReport>,
        paths: &[CriticalPath],
        anomalies: &[Anomaly],
        forecasts: &[Forecast],
    ) -> Vec<Insight> {
        let mut insights = Vec::new();

        if let Some(report) = impact {
            insights.extend(self.impact_insight(report));
        }

        let mut path_insights: Vec<(&CriticalPath, Insight)> = paths
            .iter()
            .filter(|path| path.risk_level >= Severity::Medium)
            .map(|path| (path, self.path_insight(path)))
            .collect();

        let mut groups: BTreeMap<(&AssetId, &str), Vec<&Anomaly>> = BTreeMap::new();
        for anomaly in anomalies {
            groups
                .entry((&anomaly.asset_id, anomaly.metric_name.as_str()))
                .or_default()
                .push(anomaly);
        }
        for ((asset_id, metric), group) in groups {
            let host = path_insights
                .iter_mut()
                .find(|(path, _)| path.risk_level >= Severity::High && path.contains(asset_id));
            match host {
                Some((_, insight)) => {
                    insight.evidence.extend(group.iter().map(|a| anomaly_evidence(a)));
                    insight.add_recommendation(Recommendation::InvestigateAnomaly);
                }
                None => insights.push(anomaly_insight(asset_id, metric, &group)),
            }
        }
        insights.extend(path_insights.into_iter().map(|(_, insight)| insight));

        insights.extend(forecast_insights(forecasts));
        insights.extend(self.correlations.iter().map(correlation_insight));
        insights.extend(self.graph.cycles().into_iter().map(cycle_insight));

        for insight in &mut insights {
            insight.priority = self.priority(insight);
        }
        insights.sort_by(|a, b| {
            b.priority
                .total_cmp(&a.priority)
                .then_with(|| a.id.cmp(&b.id))
        });
        insights.truncate(self.config.max_insights);
        insights
    }

    fn impact_insight(&self, report: &ImpactReport) -> Option<Insight> {
        if report.downstream.is_empty() {
            return None;
        }
        let confidence = if self.graph.is_truncated() { 0.7 } else { 1.0 };
        let mut insight = Insight::new(
            format!("impact:{}", report.seed_id),
            InsightKind::Pattern,
            report.severity_level(),
            confidence,
        )
        .affecting(std::iter::once(report.seed_id.clone()))
        .affecting(report.downstream.keys().cloned())
        .recommend(Recommendation::ReviewDownstreamConsumers);
        insight.evidence.push(Evidence::Impact {
            seed_id: report.seed_id.clone(),
            upstream: report.upstream.len(),
            downstream: report.downstream.len(),
            severity: report.severity,
        });
        Some(insight)
    }

    fn path_insight(&self, path: &CriticalPath) -> Insight {
        let complete = path
            .assets
            .iter()
            .filter(|id| self.graph.get_asset(id).is_some_and(|a| !a.is_partial()))
            .count();
        let confidence = complete as f64 / path.assets.len().max(1) as f64;
        let id = path
            .assets
            .iter()
            .map(AssetId::as_str)
            .collect::<Vec<_>>()
            .join(">");

        let mut insight = Insight::new(
            format!("path:{id}"),
            InsightKind::Pattern,
            path.risk_level,
            confidence,
        )
        .affecting(path.assets.iter().cloned())
        .recommend(Recommendation::StrengthenLineage);
        insight.evidence.push(Evidence::CriticalPath {
            assets: path.assets.clone(),
            score: path.score,
            risk_level: path.risk_level,
        });
        insight
    }

    fn priority(&self, insight: &Insight) -> f64 {
        let c = &self.config;
        let total = c.severity_weight + c.confidence_weight + c.business_weight;
        if total <= 0.0 {
            return 0.0;
        }
        let business = insight
            .affected_asset_ids
            .iter()
            .map(|id| {
                self.graph
                    .get_asset(id)
                    .map_or(Sensitivity::Internal, |a| a.sensitivity)
                    .weight()
            })
            .fold(0.0, f64::max);
        (c.severity_weight * insight.severity.score()
            + c.confidence_weight * insight.confidence
            + c.business_weight * business)
            / total
    }
}

fn anomaly_evidence(anomaly: &Anomaly) -> Evidence {
    Evidence::Anomaly {
        asset_id: anomaly.asset_id.clone(),
        metric_name: anomaly.metric_name.clone(),
        timestamp: anomaly.timestamp,
        deviation: anomaly.deviation,
        kind: anomaly.kind,
    }
}

fn anomaly_insight(asset_id: &AssetId, metric: &str, group: &[&Anomaly]) -> Insight {
    let severity = group
        .iter()
        .map(|a| a.severity)
        .max()
        .unwrap_or(Severity::Low);
    let strongest = group.iter().map(|a| a.deviation.abs()).fold(0.0, f64::max);
    let mut insight = Insight::new(
        format!("anomaly:{asset_id}:{metric}"),
        InsightKind::Anomaly,
        severity,
        strongest / (strongest + 1.0),
    )
    .affecting(std::iter::once(asset_id.clone()))
    .recommend(Recommendation::InvestigateAnomaly);
    insight.evidence = group.iter().map(|a| anomaly_evidence(a)).collect();
    insight
}

fn forecast_insights(forecasts: &[Forecast]) -> Vec<Insight> {
    let mut insights = Vec::new();
    let mut short_history = Vec::new();

    for forecast in forecasts {
        let Some(first) = forecast.points.first() else {
            short_history.push(forecast.asset_id.clone());
            continue;
        };
        let (kind, severity, id, recommendation) = match forecast.model {
            ForecastModel::Double => (
                InsightKind::Trend,
                Severity::Medium,
                format!("trend:{}:{}", forecast.asset_id, forecast.metric_name),
                Recommendation::MonitorTrend,
            ),
            ForecastModel::Simple => (
                InsightKind::Forecast,
                Severity::Low,
                format!("forecast:{}:{}", forecast.asset_id, forecast.metric_name),
                Recommendation::MonitorTrend,
            ),
        };
        let mut insight = Insight::new(id, kind, severity, first.confidence)
            .affecting(std::iter::once(forecast.asset_id.clone()))
            .recommend(recommendation);
        insight.evidence.push(Evidence::Forecast {
            asset_id: forecast.asset_id.clone(),
            metric_name: forecast.metric_name.clone(),
            model: forecast.model,
            slope: forecast.slope,
            horizon: forecast.points.len(),
        });
        insights.push(insight);
    }

    if !short_history.is_empty() {
        insights.push(
            Insight::new(
                "forecast:insufficient-history".to_string(),
                InsightKind::Forecast,
                Severity::Low,
                1.0,
            )
            .affecting(short_history)
            .recommend(Recommendation::CollectMoreHistory),
        );
    }
    insights
}

fn correlation_insight(correlation: &Correlation) -> Insight {
    let strength = correlation.coefficient.abs();
    let severity = if strength >= 0.95 {
        Severity::Medium
    } else {
        Severity::Low
    };
    let mut insight = Insight::new(
        format!(
            "correlation:{}:{}~{}:{}",
            correlation.source,
            correlation.source_metric,
            correlation.target,
            correlation.target_metric
        ),
        InsightKind::Correlation,
        severity,
        strength,
    )
    .affecting([correlation.source.clone(), correlation.target.clone()])
    .recommend(Recommendation::ReviewCorrelatedAssets);
    insight.evidence.push(Evidence::Correlation {
        source: correlation.source.clone(),
        target: correlation.target.clone(),
        coefficient: correlation.coefficient,
    });
    insight
}

fn cycle_insight(cycle: Vec<AssetId>) -> Insight {
    let id = cycle
        .iter()
        .map(AssetId::as_str)
        .collect::<Vec<_>>()
        .join(",");
    let mut insight = Insight::new(
        format!("cycle:{id}"),
        InsightKind::Pattern,
        Severity::Medium,
        1.0,
    )
    .affecting(cycle.iter().cloned())
    .recommend(Recommendation::BreakFeedbackLoop);
    insight.evidence.push(Evidence::Cycle { assets: cycle });
    insight
}
