//! Ranking of the weakest-confidence dependency chains.
//!
//! ## Search
//!
//! Depth-first enumeration of simple paths (no repeated asset) following
//! edge direction. Start assets are tried in order of fan-in, then fan-out,
//! so the most-depended-upon assets are explored before the budget runs out.
//! Parallel edges between the same two assets count once, with their best
//! confidence.
//!
//! A path scores the product of its edge confidences. Paths shorter than
//! `min_hops` are not reported.
//!
//! ## Budget
//!
//! Every single-edge extension counts against `path_budget`. Once spent, the
//! search stops and reports the best paths found so far with
//! `truncated = true`. The cancel signal is polled every
//! [`CANCEL_POLL_INTERVAL`] extensions.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::cancel::{CancelSignal, Interruption};
use crate::config::CriticalPathConfig;
use crate::domain::{AssetId, Direction, Severity};
use crate::graph::LineageGraph;

/// Extensions between cancel checks.
pub const CANCEL_POLL_INTERVAL: usize = 256;

/// The lowest-confidence edge of a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeakestLink {
    /// Upstream end
    pub source: AssetId,
    /// Downstream end
    pub target: AssetId,
    /// Edge confidence
    pub confidence: f64,
}

/// A ranked dependency chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalPath {
    /// Assets in edge order
    pub assets: Vec<AssetId>,
    /// Product of edge confidences
    pub score: f64,
    /// Lower scores are riskier
    pub risk_level: Severity,
    /// Edge that contributes most to the risk
    pub weakest_link: WeakestLink,
}

impl CriticalPath {
    /// Number of edges
    #[must_use]
    pub fn hops(&self) -> usize {
        self.assets.len().saturating_sub(1)
    }

    /// Returns `true` if `id` lies on the path
    #[must_use]
    pub fn contains(&self, id: &AssetId) -> bool {
        self.assets.contains(id)
    }
}

/// Outcome of a critical path search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriticalPathReport {
    /// Best paths, highest score first
    pub paths: Vec<CriticalPath>,
    /// Extensions explored
    pub explored: usize,
    /// `true` if the budget or an interruption cut the search short
    pub truncated: bool,
    /// Set when the search was cancelled or hit its deadline
    pub interruption: Option<Interruption>,
}

/// Enumerates and ranks simple paths within a snapshot.
#[derive(Debug, Clone, Default)]
pub struct CriticalPathDetector {
    config: CriticalPathConfig,
}

impl CriticalPathDetector {
    /// Create a detector with the given limits.
    #[must_use]
    pub fn new(config: CriticalPathConfig) -> Self {
        Self { config }
    }

    /// Map a path score to a risk level.
    #[must_use]
    pub fn risk_level(&self, score: f64) -> Severity {
        if score >= self.config.low_threshold {
            Severity::Low
        } else if score >= self.config.medium_threshold {
            Severity::Medium
        } else if score >= self.config.high_threshold {
            Severity::High
        } else {
            Severity::Critical
        }
    }

    /// Return the `top_k` highest-scoring distinct paths.
    #[must_use]
    pub fn detect(&self, graph: &LineageGraph, top_k: usize) -> CriticalPathReport {
        self.detect_with(graph, top_k, &CancelSignal::never())
    }

    /// Like [`CriticalPathDetector::detect`], stopping early if `cancel` fires.
    #[must_use]
    pub fn detect_with(
        &self,
        graph: &LineageGraph,
        top_k: usize,
        cancel: &CancelSignal,
    ) -> CriticalPathReport {
        let mut search = Search {
            graph,
            config: &self.config,
            cancel,
            explored: 0,
            stopped: false,
            interruption: None,
            found: Vec::new(),
        };

        let mut starts: Vec<&AssetId> = graph.assets().map(|asset| &asset.id).collect();
        starts.sort_by(|a, b| {
            graph
                .fan_in(b)
                .cmp(&graph.fan_in(a))
                .then_with(|| graph.fan_out(b).cmp(&graph.fan_out(a)))
                .then_with(|| a.cmp(b))
        });

        for start in starts {
            if search.stopped {
                break;
            }
            let mut path = vec![start];
            let mut on_path = HashSet::from([start]);
            search.extend(&mut path, &mut on_path, 1.0);
        }

        let explored = search.explored;
        let truncated = search.stopped;
        let interruption = search.interruption;
        if truncated {
            tracing::debug!(
                explored,
                budget = self.config.path_budget,
                ?interruption,
                "Critical path search stopped early"
            );
        }

        let mut candidates = search.found;
        candidates.sort_by(|a, b| compare(graph, a, b));
        candidates.truncate(top_k);

        let paths = candidates
            .into_iter()
            .map(|candidate| self.finish(graph, candidate))
            .collect();

        CriticalPathReport {
            paths,
            explored,
            truncated,
            interruption,
        }
    }

    fn finish(&self, graph: &LineageGraph, candidate: Candidate<'_>) -> CriticalPath {
        let weakest_link = candidate
            .assets
            .windows(2)
            .map(|pair| WeakestLink {
                source: pair[0].clone(),
                target: pair[1].clone(),
                confidence: best_confidence(graph, pair[0], pair[1]),
            })
            .min_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(Ordering::Equal)
            })
            .unwrap_or_else(|| WeakestLink {
                source: candidate.assets[0].clone(),
                target: candidate.assets[0].clone(),
                confidence: 1.0,
            });

        CriticalPath {
            assets: candidate.assets.into_iter().cloned().collect(),
            score: candidate.score,
            risk_level: self.risk_level(candidate.score),
            weakest_link,
        }
    }
}

struct Candidate<'g> {
    assets: Vec<&'g AssetId>,
    score: f64,
}

struct Search<'a, 'g> {
    graph: &'g LineageGraph,
    config: &'a CriticalPathConfig,
    cancel: &'a CancelSignal,
    explored: usize,
    stopped: bool,
    interruption: Option<Interruption>,
    found: Vec<Candidate<'g>>,
}

impl<'g> Search<'_, 'g> {
    fn extend(
        &mut self,
        path: &mut Vec<&'g AssetId>,
        on_path: &mut HashSet<&'g AssetId>,
        score: f64,
    ) {
        let hops = path.len() - 1;
        if hops >= self.config.max_hops {
            return;
        }
        let Some(&current) = path.last() else {
            return;
        };

        for (next, confidence) in successors(self.graph, current) {
            if self.stopped {
                return;
            }
            if on_path.contains(next) {
                continue;
            }
            if !self.charge() {
                return;
            }

            let next_score = score * confidence;
            path.push(next);
            on_path.insert(next);

            if hops + 1 >= self.config.min_hops {
                self.found.push(Candidate {
                    assets: path.clone(),
                    score: next_score,
                });
            }
            self.extend(path, on_path, next_score);

            on_path.remove(next);
            path.pop();
        }
    }

    /// Spend one unit of budget. Returns `false` once the search must stop.
    fn charge(&mut self) -> bool {
        if self.explored >= self.config.path_budget {
            self.stopped = true;
            return false;
        }
        self.explored += 1;
        if self.explored % CANCEL_POLL_INTERVAL == 0 {
            if let Some(interruption) = self.cancel.check() {
                self.interruption = Some(interruption);
                self.stopped = true;
                return false;
            }
        }
        true
    }
}

/// Outgoing neighbors of `id`, best confidence per neighbor, ordered by id.
fn successors<'g>(graph: &'g LineageGraph, id: &AssetId) -> BTreeMap<&'g AssetId, f64> {
    let mut best: BTreeMap<&'g AssetId, f64> = BTreeMap::new();
    for (far, relationship) in graph.steps(id, Direction::Outgoing) {
        let entry = best.entry(&far.id).or_insert(f64::NEG_INFINITY);
        *entry = entry.max(relationship.confidence);
    }
    best
}

fn best_confidence(graph: &LineageGraph, source: &AssetId, target: &AssetId) -> f64 {
    successors(graph, source).get(target).copied().unwrap_or(0.0)
}

/// Score descending, then fan-out of the end asset descending, then ids.
fn compare(graph: &LineageGraph, a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            let end = |c: &Candidate<'_>| c.assets.last().map_or(0, |id| graph.fan_out(id));
            end(b).cmp(&end(a))
        })
        .then_with(|| a.assets.cmp(&b.assets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::{asset, edge, ids};
    use rstest::rstest;

    fn graph(nodes: &[&str], edges: &[(&str, &str, f64)]) -> LineageGraph {
        LineageGraph::from_parts(
            nodes[0],
            nodes.iter().map(|id| asset(id)).collect(),
            edges.iter().map(|(s, t, c)| edge(s, t, *c)).collect(),
        )
    }

    fn cyclic() -> LineageGraph {
        graph(
            &["A", "B", "C"],
            &[("A", "B", 0.9), ("B", "C", 0.8), ("C", "A", 0.3)],
        )
    }

    #[test]
    fn strong_chain_ranks_first() {
        let report = CriticalPathDetector::default().detect(&cyclic(), 5);

        let best = &report.paths[0];
        assert_eq!(best.assets, ids(&["A", "B", "C"]));
        assert!((best.score - 0.72).abs() < 1e-9);
        assert_eq!(best.risk_level, Severity::Medium);
        assert_eq!(best.weakest_link.source, AssetId::new("B"));
        assert!(!report.truncated);

        // Every path through the 0.3 edge ranks lower.
        for path in &report.paths[1..] {
            assert!(path.score < best.score);
        }
    }

    #[test]
    fn paths_are_simple_on_cycles() {
        let report = CriticalPathDetector::default().detect(&cyclic(), 100);

        // Three rotations of the 2-hop cycle; no 3-hop path without repeating.
        assert_eq!(report.paths.len(), 3);
        for path in &report.paths {
            let unique: HashSet<_> = path.assets.iter().collect();
            assert_eq!(unique.len(), path.assets.len());
            assert_eq!(path.hops(), 2);
        }
    }

    #[test]
    fn single_hops_are_not_reported() {
        let report = CriticalPathDetector::default().detect(&graph(&["A", "B"], &[("A", "B", 0.5)]), 10);
        assert!(report.paths.is_empty());
    }

    #[test]
    fn top_k_limits_results() {
        let g = graph(
            &["A", "B", "C", "D"],
            &[("A", "B", 0.9), ("B", "C", 0.9), ("C", "D", 0.9)],
        );
        let report = CriticalPathDetector::default().detect(&g, 1);
        assert_eq!(report.paths.len(), 1);
        // A->B->C and B->C->D tie on score; C still feeds D, the sink does not.
        assert_eq!(report.paths[0].assets, ids(&["A", "B", "C"]));
    }

    #[test]
    fn budget_exhaustion_truncates() {
        let g = graph(
            &["A", "B", "C", "D", "E"],
            &[
                ("A", "B", 0.9),
                ("A", "C", 0.9),
                ("B", "D", 0.9),
                ("C", "D", 0.9),
                ("D", "E", 0.9),
            ],
        );
        let config = CriticalPathConfig {
            path_budget: 3,
            ..CriticalPathConfig::default()
        };
        let report = CriticalPathDetector::new(config).detect(&g, 10);

        assert!(report.truncated);
        assert_eq!(report.explored, 3);
        assert!(report.interruption.is_none());
    }

    #[test]
    fn max_hops_bounds_length() {
        let g = graph(
            &["A", "B", "C", "D", "E"],
            &[("A", "B", 1.0), ("B", "C", 1.0), ("C", "D", 1.0), ("D", "E", 1.0)],
        );
        let config = CriticalPathConfig {
            max_hops: 3,
            ..CriticalPathConfig::default()
        };
        let report = CriticalPathDetector::new(config).detect(&g, 100);
        assert!(report.paths.iter().all(|p| p.hops() <= 3));
        assert!(report.paths.iter().any(|p| p.hops() == 3));
    }

    #[test]
    fn cancelled_search_reports_interruption() {
        // Dense enough to pass the poll interval.
        let names: Vec<String> = (0..8).map(|i| format!("n{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut edges = Vec::new();
        for a in &refs {
            for b in &refs {
                if a != b {
                    edges.push((*a, *b, 0.9));
                }
            }
        }
        let g = graph(&refs, &edges);
        let (handle, signal) = CancelSignal::pair();
        handle.cancel();

        let report = CriticalPathDetector::default().detect_with(&g, 5, &signal);

        assert!(report.truncated);
        assert_eq!(report.interruption, Some(Interruption::Cancelled));
        assert_eq!(report.explored, CANCEL_POLL_INTERVAL);
    }

    #[rstest]
    #[case(0.95, Severity::Low)]
    #[case(0.8, Severity::Low)]
    #[case(0.72, Severity::Medium)]
    #[case(0.3, Severity::High)]
    #[case(0.1, Severity::Critical)]
    fn risk_mapping(#[case] score: f64, #[case] expected: Severity) {
        assert_eq!(CriticalPathDetector::default().risk_level(score), expected);
    }
}
