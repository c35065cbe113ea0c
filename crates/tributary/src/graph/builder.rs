//! Bounded, level-by-level lineage expansion.
//!
//! ## Algorithm
//!
//! 1. Fetch the seed asset. `NotFound` is fatal (`Error::InvalidSeed`).
//! 2. For each BFS level up to `max_depth`:
//!    - fetch relationships for every frontier node concurrently
//!    - collect endpoints not yet materialized, capped by `max_nodes`
//!    - fetch those assets concurrently
//!    - materialize edges whose endpoints are both present; defer the rest
//!    - resolve deferred edges whose missing endpoint has now appeared
//! 3. Edges still deferred at the end become boundary edges.
//!
//! The join after each level is the only synchronization point.
//!
//! ## Failure handling
//!
//! A failed call marks the asset partial and is recorded in the build
//! metadata. If every call of a level fails the provider is considered
//! unavailable and expansion stops with what it has. Only an unknown seed,
//! or a seed about which nothing at all could be fetched, is an error.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use super::{BuildMetadata, FetchFailure, FetchOperation, LineageGraph, TruncationReason};
use crate::cancel::{CancelSignal, Interruption};
use crate::config::BuildConfig;
use crate::domain::{
    Asset, AssetId, AssetRecord, PartialReason, Relationship, RelationshipKey, RelationshipRecord,
};
use crate::error::{Error, ProviderError, Result};
use crate::provider::MetadataProvider;

type Fetched<T> = Vec<(AssetId, std::result::Result<T, ProviderError>)>;

/// Expands lineage snapshots from a metadata provider.
#[derive(Clone)]
pub struct GraphBuilder {
    provider: Arc<dyn MetadataProvider>,
    config: BuildConfig,
}

impl GraphBuilder {
    /// Create a builder over `provider`.
    ///
    /// `config.max_depth` and `config.max_nodes` are defaults only; the
    /// `build` methods take explicit bounds.
    pub fn new(provider: Arc<dyn MetadataProvider>, config: BuildConfig) -> Self {
        Self { provider, config }
    }

    /// Build a snapshot around `seed`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidSeed` if the provider does not know `seed`
    /// - `Error::ProviderUnavailable` if nothing about `seed` could be fetched
    pub async fn build(
        &self,
        seed: &AssetId,
        max_depth: usize,
        max_nodes: usize,
    ) -> Result<LineageGraph> {
        self.build_with(seed, max_depth, max_nodes, &CancelSignal::never())
            .await
    }

    /// Build a snapshot around `seed`, stopping early if `cancel` fires.
    ///
    /// An interrupted build returns the levels completed so far with
    /// `truncated = true`.
    ///
    /// # Errors
    ///
    /// Same as [`GraphBuilder::build`].
    pub async fn build_with(
        &self,
        seed: &AssetId,
        max_depth: usize,
        max_nodes: usize,
        cancel: &CancelSignal,
    ) -> Result<LineageGraph> {
        let max_nodes = max_nodes.max(1);
        let mut state = BuildState::new(self.config.max_edges);

        tracing::debug!(%seed, max_depth, max_nodes, "Building lineage graph");

        let seed_fetched = match self
            .fetch_assets(std::slice::from_ref(seed), cancel)
            .await
            .pop()
        {
            Some((_, Ok(record))) => {
                state.insert_asset(Asset::from(record));
                true
            }
            Some((_, Err(ProviderError::NotFound(_)))) => {
                return Err(Error::InvalidSeed(seed.clone()));
            }
            Some((_, Err(error))) => {
                state.fail(seed, FetchOperation::Asset, &error);
                state.insert_asset(Asset::placeholder(seed.clone()));
                false
            }
            None => false,
        };
        if !seed_fetched && max_depth == 0 {
            return Err(Error::ProviderUnavailable(format!(
                "could not fetch seed asset {seed}"
            )));
        }

        let mut frontier = vec![seed.clone()];
        let mut level = 0;

        while level < max_depth && !frontier.is_empty() {
            if let Some(interruption) = cancel.check() {
                state.interrupt(interruption);
                break;
            }

            let fetched = match interruptible(cancel, self.fetch_relationships(&frontier, cancel))
                .await
            {
                Ok(fetched) => fetched,
                Err(interruption) => {
                    state.interrupt(interruption);
                    break;
                }
            };

            let attempts = fetched.len();
            let mut failures = 0;
            let mut discovered = BTreeSet::new();
            let mut level_edges = Vec::new();

            for (id, result) in fetched {
                match result {
                    Ok(records) => {
                        for record in records {
                            let relationship = Relationship::from(record);
                            for endpoint in [&relationship.source, &relationship.target] {
                                if !state.assets.contains_key(endpoint) {
                                    discovered.insert(endpoint.clone());
                                }
                            }
                            level_edges.push(relationship);
                        }
                    }
                    Err(error) => {
                        failures += 1;
                        state.fail(&id, FetchOperation::Relationships, &error);
                    }
                }
            }

            if failures == attempts {
                if level == 0 && !seed_fetched {
                    return Err(Error::ProviderUnavailable(format!(
                        "could not fetch seed asset {seed} or its relationships"
                    )));
                }
                tracing::warn!(level, "Every relationship fetch failed; stopping expansion");
                state.metadata.truncate(TruncationReason::ProviderUnavailable { level });
                break;
            }

            let room = max_nodes.saturating_sub(state.assets.len());
            let mut to_fetch: Vec<AssetId> = discovered.into_iter().collect();
            if to_fetch.len() > room {
                tracing::warn!(
                    level,
                    limit = max_nodes,
                    dropped = to_fetch.len() - room,
                    "Node limit reached"
                );
                to_fetch.truncate(room);
                state
                    .metadata
                    .truncate(TruncationReason::NodeLimit { limit: max_nodes });
            }

            let records = match interruptible(cancel, self.fetch_assets(&to_fetch, cancel)).await {
                Ok(records) => records,
                Err(interruption) => {
                    // Keep edges between assets we already hold.
                    state.merge_edges(level_edges);
                    state.interrupt(interruption);
                    break;
                }
            };

            let mut next = Vec::with_capacity(records.len());
            let mut asset_failures = 0;
            for (id, result) in records {
                match result {
                    Ok(record) => {
                        state.insert_asset(Asset::from(record));
                        next.push(id);
                    }
                    Err(ProviderError::NotFound(_)) => {
                        tracing::debug!(%id, "Relationship references unknown asset");
                    }
                    Err(error) => {
                        asset_failures += 1;
                        state.fail(&id, FetchOperation::Asset, &error);
                        state.insert_asset(Asset::placeholder(id.clone()));
                        next.push(id);
                    }
                }
            }
            if asset_failures > 0 && asset_failures == to_fetch.len() {
                tracing::warn!(level = level + 1, "Every asset fetch failed");
                state
                    .metadata
                    .truncate(TruncationReason::ProviderUnavailable { level: level + 1 });
            }

            state.merge_edges(level_edges);

            level += 1;
            if !next.is_empty() {
                state.metadata.depth_reached = level;
            }
            tracing::debug!(
                level,
                assets = state.assets.len(),
                edges = state.edges.len(),
                deferred = state.deferred.len(),
                "Expanded level"
            );
            frontier = next;
        }

        let graph = state.finish(seed.clone());
        if graph.is_truncated() {
            tracing::warn!(
                %seed,
                assets = graph.node_count(),
                reasons = ?graph.metadata().reasons,
                "Lineage graph truncated"
            );
        } else {
            tracing::debug!(
                %seed,
                assets = graph.node_count(),
                edges = graph.edge_count(),
                "Lineage graph built"
            );
        }
        Ok(graph)
    }

    fn call_timeout(&self, cancel: &CancelSignal) -> Duration {
        let timeout = self.config.fetch_timeout();
        cancel
            .remaining()
            .map_or(timeout, |remaining| remaining.min(timeout))
    }

    async fn fetch_assets(&self, ids: &[AssetId], cancel: &CancelSignal) -> Fetched<AssetRecord> {
        let timeout = self.call_timeout(cancel);
        stream::iter(ids.iter().cloned())
            .map(|id| {
                let provider = Arc::clone(&self.provider);
                async move {
                    let result = with_timeout(timeout, provider.get_asset(&id)).await;
                    (id, result)
                }
            })
            .buffered(self.config.max_concurrent_fetches.max(1))
            .collect()
            .await
    }

    async fn fetch_relationships(
        &self,
        ids: &[AssetId],
        cancel: &CancelSignal,
    ) -> Fetched<Vec<RelationshipRecord>> {
        let timeout = self.call_timeout(cancel);
        let direction = self.config.direction;
        stream::iter(ids.iter().cloned())
            .map(|id| {
                let provider = Arc::clone(&self.provider);
                async move {
                    let result =
                        with_timeout(timeout, provider.get_relationships(&id, direction)).await;
                    (id, result)
                }
            })
            .buffered(self.config.max_concurrent_fetches.max(1))
            .collect()
            .await
    }
}

async fn with_timeout<T>(
    timeout: Duration,
    call: impl Future<Output = std::result::Result<T, ProviderError>>,
) -> std::result::Result<T, ProviderError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(timeout)),
    }
}

async fn interruptible<T>(
    cancel: &CancelSignal,
    work: impl Future<Output = T>,
) -> std::result::Result<T, Interruption> {
    tokio::select! {
        biased;
        interruption = cancel.fired() => Err(interruption),
        value = work => Ok(value),
    }
}

/// Accumulating state of one build. Discarded once the snapshot is assembled.
struct BuildState {
    assets: HashMap<AssetId, Asset>,
    edges: BTreeMap<RelationshipKey, Relationship>,
    deferred: BTreeMap<RelationshipKey, Relationship>,
    partial: HashSet<AssetId>,
    max_edges: usize,
    metadata: BuildMetadata,
}

impl BuildState {
    fn new(max_edges: usize) -> Self {
        Self {
            assets: HashMap::new(),
            edges: BTreeMap::new(),
            deferred: BTreeMap::new(),
            partial: HashSet::new(),
            max_edges,
            metadata: BuildMetadata::default(),
        }
    }

    fn insert_asset(&mut self, asset: Asset) {
        if asset.is_partial() {
            self.partial.insert(asset.id.clone());
        }
        self.assets.insert(asset.id.clone(), asset);
    }

    fn fail(&mut self, id: &AssetId, operation: FetchOperation, error: &ProviderError) {
        tracing::warn!(%id, ?operation, %error, "Provider call failed");
        self.metadata.failures.push(FetchFailure {
            asset_id: id.clone(),
            operation,
            message: error.to_string(),
        });
        self.partial.insert(id.clone());
        if operation == FetchOperation::Relationships {
            if let Some(asset) = self.assets.get_mut(id) {
                asset.partial.get_or_insert(PartialReason::RelationshipsUnavailable);
            }
        }
    }

    fn interrupt(&mut self, interruption: Interruption) {
        tracing::warn!(?interruption, "Lineage build interrupted");
        self.metadata.truncate(match interruption {
            Interruption::Cancelled => TruncationReason::Cancelled,
            Interruption::DeadlineExceeded => TruncationReason::DeadlineExceeded,
        });
    }

    /// Add newly fetched edges, then retry every deferred edge.
    fn merge_edges(&mut self, relationships: Vec<Relationship>) {
        for relationship in relationships {
            let key = relationship.key();
            if self.edges.contains_key(&key) {
                continue;
            }
            self.deferred.entry(key).or_insert(relationship);
        }

        let ready: Vec<RelationshipKey> = self
            .deferred
            .iter()
            .filter(|(_, rel)| {
                self.assets.contains_key(&rel.source) && self.assets.contains_key(&rel.target)
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in ready {
            if self.edges.len() >= self.max_edges {
                self.metadata.truncate(TruncationReason::EdgeLimit {
                    limit: self.max_edges,
                });
                break;
            }
            if let Some(relationship) = self.deferred.remove(&key) {
                self.edges.insert(key, relationship);
            }
        }
    }

    fn finish(mut self, seed: AssetId) -> LineageGraph {
        if !self.partial.is_empty() {
            let mut assets: Vec<AssetId> = self.partial.iter().cloned().collect();
            assets.sort();
            self.metadata.truncate(TruncationReason::PartialFetch { assets });
        }
        LineageGraph::new(
            seed,
            self.assets.into_values().collect(),
            self.edges.into_values().collect(),
            self.deferred.into_values().collect(),
            self.metadata,
        )
    }
}
