//! Upstream and downstream impact of a single asset.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ImpactConfig;
use crate::domain::{AssetId, AssetStatus, Direction, Sensitivity, Severity};
use crate::error::{Error, Result};
use crate::graph::{LineageGraph, Traversal};

/// Blast radius of one asset within a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    /// Asset the report is about
    pub seed_id: AssetId,
    /// Assets feeding into the seed, with hop distance
    pub upstream: BTreeMap<AssetId, usize>,
    /// Assets fed by the seed, with hop distance
    pub downstream: BTreeMap<AssetId, usize>,
    /// Downstream assets at or above `confidential`
    pub sensitive_downstream: Vec<AssetId>,
    /// Downstream assets in `error` status
    pub failing_downstream: Vec<AssetId>,
    /// Weighted share of sensitive and failing downstream assets, in [0, 1]
    pub severity: f64,
}

impl ImpactReport {
    /// Severity bucket: quarters of the [0, 1] score.
    #[must_use]
    pub fn severity_level(&self) -> Severity {
        match self.severity {
            s if s >= 0.75 => Severity::Critical,
            s if s >= 0.5 => Severity::High,
            s if s >= 0.25 => Severity::Medium,
            _ => Severity::Low,
        }
    }

    /// Every affected asset, upstream and downstream, sorted and deduplicated.
    #[must_use]
    pub fn affected(&self) -> Vec<AssetId> {
        let mut ids: Vec<AssetId> = self
            .upstream
            .keys()
            .chain(self.downstream.keys())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Computes impact reports over an already built snapshot.
#[derive(Debug, Clone, Default)]
pub struct ImpactAnalyzer {
    config: ImpactConfig,
}

impl ImpactAnalyzer {
    /// Create an analyzer with the given weights.
    #[must_use]
    pub fn new(config: ImpactConfig) -> Self {
        Self { config }
    }

    /// Compute the impact report of `seed`.
    ///
    /// Only relationships of the configured kinds propagate impact. The
    /// report is a pure function of the snapshot.
    ///
    /// # Errors
    ///
    /// `Error::InvalidSeed` if `seed` is not in the snapshot.
    pub fn analyze(&self, graph: &LineageGraph, seed: &AssetId) -> Result<ImpactReport> {
        if !graph.contains(seed) {
            return Err(Error::InvalidSeed(seed.clone()));
        }

        let traversal = Traversal::new(graph).with_kinds(&self.config.kinds);
        let unbounded = graph.node_count();
        let downstream = traversal.hop_distances(seed, Direction::Outgoing, unbounded);
        let upstream = traversal.hop_distances(seed, Direction::Incoming, unbounded);

        let mut sensitive_downstream = Vec::new();
        let mut failing_downstream = Vec::new();
        for id in downstream.keys() {
            let Some(asset) = graph.get_asset(id) else {
                continue;
            };
            if asset.sensitivity >= Sensitivity::Confidential {
                sensitive_downstream.push(id.clone());
            }
            if asset.status == AssetStatus::Error {
                failing_downstream.push(id.clone());
            }
        }

        let severity = self.severity(
            downstream.len(),
            sensitive_downstream.len(),
            failing_downstream.len(),
        );

        tracing::debug!(
            %seed,
            upstream = upstream.len(),
            downstream = downstream.len(),
            severity,
            "Impact analyzed"
        );

        Ok(ImpactReport {
            seed_id: seed.clone(),
            upstream,
            downstream,
            sensitive_downstream,
            failing_downstream,
            severity,
        })
    }

    fn severity(&self, total: usize, sensitive: usize, failing: usize) -> f64 {
        let weights = self.config.sensitive_weight + self.config.error_weight;
        if total == 0 || weights <= 0.0 {
            return 0.0;
        }
        let total = total as f64;
        let score = self.config.sensitive_weight * (sensitive as f64 / total)
            + self.config.error_weight * (failing as f64 / total);
        (score / weights).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RelationshipKind;
    use crate::graph::test_support::{asset, edge, edge_of};
    use rstest::rstest;

    fn id(raw: &str) -> AssetId {
        AssetId::new(raw)
    }

    /// raw -> orders -> revenue (restricted), orders -> audit (error)
    fn warehouse() -> LineageGraph {
        let mut revenue = asset("revenue");
        revenue.sensitivity = Sensitivity::Restricted;
        let mut audit = asset("audit");
        audit.status = AssetStatus::Error;

        LineageGraph::from_parts(
            "orders",
            vec![asset("raw"), asset("orders"), revenue, audit],
            vec![
                edge("raw", "orders", 0.9),
                edge("orders", "revenue", 0.8),
                edge("orders", "audit", 0.7),
            ],
        )
    }

    #[test]
    fn reports_both_directions_with_distances() {
        let report = ImpactAnalyzer::default()
            .analyze(&warehouse(), &id("orders"))
            .unwrap();

        assert_eq!(report.upstream, BTreeMap::from([(id("raw"), 1)]));
        assert_eq!(
            report.downstream,
            BTreeMap::from([(id("audit"), 1), (id("revenue"), 1)])
        );
        assert_eq!(report.sensitive_downstream, vec![id("revenue")]);
        assert_eq!(report.failing_downstream, vec![id("audit")]);
    }

    #[test]
    fn severity_is_weighted_share() {
        let report = ImpactAnalyzer::default()
            .analyze(&warehouse(), &id("orders"))
            .unwrap();
        // (0.6 * 1/2 + 0.4 * 1/2) / 1.0
        assert!((report.severity - 0.5).abs() < 1e-9);
        assert_eq!(report.severity_level(), Severity::High);
    }

    #[test]
    fn leaf_has_zero_severity() {
        let report = ImpactAnalyzer::default()
            .analyze(&warehouse(), &id("revenue"))
            .unwrap();
        assert!(report.downstream.is_empty());
        assert!(report.severity.abs() < f64::EPSILON);
        assert_eq!(report.severity_level(), Severity::Low);
    }

    #[test]
    fn unknown_seed_is_invalid() {
        let result = ImpactAnalyzer::default().analyze(&warehouse(), &id("nope"));
        assert!(matches!(result, Err(Error::InvalidSeed(_))));
    }

    #[test]
    fn analyze_is_idempotent() {
        let graph = warehouse();
        let analyzer = ImpactAnalyzer::default();
        let first = analyzer.analyze(&graph, &id("raw")).unwrap();
        let second = analyzer.analyze(&graph, &id("raw")).unwrap();
        assert_eq!(first, second);
    }

    #[rstest]
    #[case::reference_ignored(RelationshipKind::Reference, 0)]
    #[case::transformation_ignored(RelationshipKind::Transformation, 0)]
    #[case::dependency_followed(RelationshipKind::Dependency, 1)]
    fn only_configured_kinds_propagate(#[case] kind: RelationshipKind, #[case] expected: usize) {
        let graph = LineageGraph::from_parts(
            "a",
            vec![asset("a"), asset("b")],
            vec![edge_of("a", "b", kind, 1.0)],
        );
        let report = ImpactAnalyzer::default().analyze(&graph, &id("a")).unwrap();
        assert_eq!(report.downstream.len(), expected);
    }

    #[test]
    fn cycles_do_not_include_seed() {
        let graph = LineageGraph::from_parts(
            "a",
            vec![asset("a"), asset("b")],
            vec![edge("a", "b", 1.0), edge("b", "a", 1.0)],
        );
        let report = ImpactAnalyzer::default().analyze(&graph, &id("a")).unwrap();
        assert_eq!(report.downstream, BTreeMap::from([(id("b"), 1)]));
        assert_eq!(report.upstream, BTreeMap::from([(id("b"), 1)]));
    }
}
