//! Immutable lineage snapshots.
//!
//! A [`LineageGraph`] is built once per query by the [`GraphBuilder`] and is
//! read-only afterwards, so any number of analyzers can share it (behind an
//! `Arc` or a plain `&`) without locking.
//!
//! # Architecture
//!
//! The store uses:
//! - `petgraph::DiGraph<Asset, Relationship>` as an arena of nodes and edges
//! - `HashMap<AssetId, NodeIndex>` for O(1) asset lookup
//! - petgraph's adjacency lists for O(degree) neighbor lookup
//!
//! Edges point from upstream (source) to downstream (target). Cycles are
//! normal and every algorithm over the graph tolerates them.
//!
//! Relationships whose far endpoint was never materialized are kept aside as
//! boundary edges: reported for context, never traversed.

use std::collections::{BTreeMap, HashMap};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, EdgeReference, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::domain::{Asset, AssetId, AssetKind, Direction, Relationship, RelationshipKind};

pub mod builder;
pub mod traversal;

pub use builder::GraphBuilder;
pub use traversal::Traversal;

/// Why a snapshot is incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TruncationReason {
    /// The node cap was reached before expansion finished.
    NodeLimit {
        /// Configured cap
        limit: usize,
    },
    /// The edge cap was reached before expansion finished.
    EdgeLimit {
        /// Configured cap
        limit: usize,
    },
    /// Every provider call of a level failed; expansion stopped there.
    ProviderUnavailable {
        /// Level (hop distance from the seed) that could not be expanded
        level: usize,
    },
    /// Some provider calls failed; the listed assets are marked partial.
    PartialFetch {
        /// Assets with at least one failed call
        assets: Vec<AssetId>,
    },
    /// The caller cancelled the build.
    Cancelled,
    /// The build deadline passed.
    DeadlineExceeded,
}

/// Provider call that a build attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOperation {
    /// `get_asset`
    Asset,
    /// `get_relationships`
    Relationships,
}

/// A provider call that failed during a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    /// Asset the call was about
    pub asset_id: AssetId,
    /// Which call failed
    pub operation: FetchOperation,
    /// Provider error message
    pub message: String,
}

/// How a snapshot was produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMetadata {
    /// Deepest level whose assets were materialized
    pub depth_reached: usize,
    /// `true` if any cap, failure or interruption cut the build short
    pub truncated: bool,
    /// Every reason the build is incomplete
    pub reasons: Vec<TruncationReason>,
    /// Every failed provider call
    pub failures: Vec<FetchFailure>,
}

impl BuildMetadata {
    /// Record a truncation reason, marking the build truncated.
    pub(crate) fn truncate(&mut self, reason: TruncationReason) {
        self.truncated = true;
        if !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
    }
}

/// Counts by kind, for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    /// Number of assets
    pub assets: usize,
    /// Number of traversable relationships
    pub relationships: usize,
    /// Number of boundary relationships
    pub boundary: usize,
    /// Number of assets marked partial
    pub partial_assets: usize,
    /// Assets per kind
    pub assets_by_kind: BTreeMap<AssetKind, usize>,
    /// Relationships per kind
    pub relationships_by_kind: BTreeMap<RelationshipKind, usize>,
}

/// Serializable copy of a snapshot, for transport to other layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Seed asset
    pub seed: AssetId,
    /// Assets sorted by id
    pub assets: Vec<Asset>,
    /// Relationships sorted by (source, target, kind)
    pub relationships: Vec<Relationship>,
    /// Boundary relationships
    pub boundary: Vec<Relationship>,
    /// Build metadata
    pub metadata: BuildMetadata,
}

/// Immutable snapshot of assets and relationships reachable from a seed.
#[derive(Debug, Clone)]
pub struct LineageGraph {
    seed: AssetId,
    graph: DiGraph<Asset, Relationship>,
    index: HashMap<AssetId, NodeIndex>,
    boundary: Vec<Relationship>,
    metadata: BuildMetadata,
}

impl LineageGraph {
    /// Assemble a snapshot. Every relationship must have both endpoints in `assets`.
    ///
    /// Assets and relationships are inserted in sorted order so node indices,
    /// and therefore iteration order, are deterministic.
    pub(crate) fn new(
        seed: AssetId,
        mut assets: Vec<Asset>,
        mut relationships: Vec<Relationship>,
        boundary: Vec<Relationship>,
        metadata: BuildMetadata,
    ) -> Self {
        assets.sort_by(|a, b| a.id.cmp(&b.id));
        relationships.sort_by(|a, b| a.key().cmp(&b.key()));

        let mut graph = DiGraph::with_capacity(assets.len(), relationships.len());
        let mut index = HashMap::with_capacity(assets.len());
        for asset in assets {
            let id = asset.id.clone();
            let node = graph.add_node(asset);
            index.insert(id, node);
        }
        for relationship in relationships {
            // Builder guarantees both endpoints; skip rather than panic if not.
            let (Some(&source), Some(&target)) = (
                index.get(&relationship.source),
                index.get(&relationship.target),
            ) else {
                continue;
            };
            graph.add_edge(source, target, relationship);
        }

        Self {
            seed,
            graph,
            index,
            boundary,
            metadata,
        }
    }

    /// Build a snapshot directly from parts, without a provider.
    ///
    /// Relationships with an endpoint outside `assets` become boundary edges.
    /// Duplicate relationships (same source, target and kind) keep the first.
    #[cfg(any(test, feature = "test-util"))]
    #[must_use]
    pub fn from_parts(
        seed: impl Into<AssetId>,
        assets: Vec<Asset>,
        relationships: Vec<Relationship>,
    ) -> Self {
        use std::collections::HashSet;

        let ids: HashSet<AssetId> = assets.iter().map(|a| a.id.clone()).collect();
        let mut seen = HashSet::new();
        let mut inner = Vec::new();
        let mut boundary = Vec::new();
        for relationship in relationships {
            if !seen.insert(relationship.key()) {
                continue;
            }
            if ids.contains(&relationship.source) && ids.contains(&relationship.target) {
                inner.push(relationship);
            } else {
                boundary.push(relationship);
            }
        }
        Self::new(seed.into(), assets, inner, boundary, BuildMetadata::default())
    }

    /// The asset the snapshot was built from
    #[must_use]
    pub fn seed(&self) -> &AssetId {
        &self.seed
    }

    /// Look up an asset by id
    #[must_use]
    pub fn get_asset(&self, id: &AssetId) -> Option<&Asset> {
        self.index.get(id).map(|&node| &self.graph[node])
    }

    /// Returns `true` if the asset is part of the snapshot
    #[must_use]
    pub fn contains(&self, id: &AssetId) -> bool {
        self.index.contains_key(id)
    }

    /// Relationships touching `id` in the given direction, sorted by (source, target, kind).
    ///
    /// Returns an empty list for unknown ids. Boundary edges are never included.
    #[must_use]
    pub fn neighbors(&self, id: &AssetId, direction: Direction) -> Vec<&Relationship> {
        let Some(&node) = self.index.get(id) else {
            return Vec::new();
        };
        let mut edges: Vec<&Relationship> = self
            .edge_refs(node, direction)
            .map(|edge| edge.weight())
            .collect();
        edges.sort_by(|a, b| {
            (&a.source, &a.target, a.kind).cmp(&(&b.source, &b.target, b.kind))
        });
        edges
    }

    /// Number of incoming relationships
    #[must_use]
    pub fn fan_in(&self, id: &AssetId) -> usize {
        self.index.get(id).map_or(0, |&node| {
            self.edge_refs(node, Direction::Incoming).count()
        })
    }

    /// Number of outgoing relationships
    #[must_use]
    pub fn fan_out(&self, id: &AssetId) -> usize {
        self.index.get(id).map_or(0, |&node| {
            self.edge_refs(node, Direction::Outgoing).count()
        })
    }

    /// Every asset, sorted by id
    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.graph.raw_nodes().iter().map(|node| &node.weight)
    }

    /// Every traversable relationship, sorted by (source, target, kind)
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.graph.raw_edges().iter().map(|edge| &edge.weight)
    }

    /// Relationships with an endpoint outside the snapshot
    #[must_use]
    pub fn boundary(&self) -> &[Relationship] {
        &self.boundary
    }

    /// Number of assets
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of traversable relationships
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// How the snapshot was built
    #[must_use]
    pub fn metadata(&self) -> &BuildMetadata {
        &self.metadata
    }

    /// Deepest level materialized
    #[must_use]
    pub fn depth_reached(&self) -> usize {
        self.metadata.depth_reached
    }

    /// `true` if caps, failures or interruption cut the build short
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.metadata.truncated
    }

    /// Feedback loops: strongly connected groups of assets.
    ///
    /// Each cycle is a sorted list of asset ids; single assets appear only
    /// when they have a self loop. The result is sorted.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<AssetId>> {
        let mut cycles: Vec<Vec<AssetId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&node| self.graph.contains_edge(node, node))
            })
            .map(|component| {
                let mut ids: Vec<AssetId> = component
                    .into_iter()
                    .map(|node| self.graph[node].id.clone())
                    .collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Counts by kind
    #[must_use]
    pub fn summary(&self) -> GraphSummary {
        let mut summary = GraphSummary {
            assets: self.node_count(),
            relationships: self.edge_count(),
            boundary: self.boundary.len(),
            ..GraphSummary::default()
        };
        for asset in self.assets() {
            *summary.assets_by_kind.entry(asset.kind).or_default() += 1;
            if asset.is_partial() {
                summary.partial_assets += 1;
            }
        }
        for relationship in self.relationships() {
            *summary
                .relationships_by_kind
                .entry(relationship.kind)
                .or_default() += 1;
        }
        summary
    }

    /// Serializable copy of the snapshot
    #[must_use]
    pub fn to_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            seed: self.seed.clone(),
            assets: self.assets().cloned().collect(),
            relationships: self.relationships().cloned().collect(),
            boundary: self.boundary.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Edges touching `node` in `direction`, paired with the node on the far side.
    pub(crate) fn steps(
        &self,
        id: &AssetId,
        direction: Direction,
    ) -> impl Iterator<Item = (&Asset, &Relationship)> {
        let node = self.index.get(id).copied();
        node.into_iter().flat_map(move |node| {
            self.edge_refs(node, direction).map(move |edge| {
                let far = if edge.source() == node {
                    edge.target()
                } else {
                    edge.source()
                };
                (&self.graph[far], edge.weight())
            })
        })
    }

    fn edge_refs(
        &self,
        node: NodeIndex,
        direction: Direction,
    ) -> Box<dyn Iterator<Item = EdgeReference<'_, Relationship>> + '_> {
        match direction {
            Direction::Outgoing => {
                Box::new(self.graph.edges_directed(node, petgraph::Direction::Outgoing))
            }
            Direction::Incoming => {
                Box::new(self.graph.edges_directed(node, petgraph::Direction::Incoming))
            }
            Direction::Both => Box::new(
                self.graph
                    .edges_directed(node, petgraph::Direction::Outgoing)
                    .chain(
                        self.graph
                            .edges_directed(node, petgraph::Direction::Incoming)
                            // A self loop already appeared as outgoing.
                            .filter(move |edge| edge.source() != node),
                    ),
            ),
        }
    }
}
