//! External collaborator interfaces.
//!
//! The engine never owns asset storage. It pulls identities and relationships
//! from a [`MetadataProvider`] and time series from a [`MetricProvider`].
//!
//! # Architecture
//!
//! Both traits are async and object-safe so callers can hand the engine a
//! `Arc<dyn MetadataProvider>` backed by a REST client, a database, or the
//! bundled [`InMemoryCatalog`].
//!
//! Retry and backoff are the provider's responsibility. The engine applies a
//! per-call timeout and otherwise takes each answer as final.

use async_trait::async_trait;

use crate::domain::{
    AssetId, AssetRecord, Direction, Granularity, MetricSeries, RelationshipRecord, TimeRange,
};
use crate::error::ProviderError;

pub mod in_memory;

pub use in_memory::{CatalogFile, InMemoryCatalog};

/// Source of asset identities and directed relationships.
///
/// Implementations must be `Send + Sync`; the graph builder issues calls for
/// every node of a BFS level concurrently.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fetch a single asset record.
    ///
    /// # Errors
    ///
    /// - `ProviderError::NotFound` if the asset does not exist
    /// - `ProviderError::Transient` / `Permanent` for backend failures
    async fn get_asset(&self, id: &AssetId) -> Result<AssetRecord, ProviderError>;

    /// Fetch relationships touching `id`.
    ///
    /// `Direction::Outgoing` returns edges where `id` is the source,
    /// `Direction::Incoming` edges where it is the target, and
    /// `Direction::Both` the union of the two.
    ///
    /// # Errors
    ///
    /// Same as [`MetadataProvider::get_asset`].
    async fn get_relationships(
        &self,
        id: &AssetId,
        direction: Direction,
    ) -> Result<Vec<RelationshipRecord>, ProviderError>;
}

/// Source of per-asset metric history.
#[async_trait]
pub trait MetricProvider: Send + Sync {
    /// Fetch one metric series restricted to `range` at `granularity`.
    ///
    /// Returns an empty series, not an error, when no data exists.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    async fn get_series(
        &self,
        asset_id: &AssetId,
        metric: &str,
        range: TimeRange,
        granularity: Granularity,
    ) -> Result<MetricSeries, ProviderError>;
}
