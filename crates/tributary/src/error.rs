//! Error types for tributary operations.
//!
//! Errors are split into two layers:
//!
//! - **`Error`**: caller-visible failures of a top-level operation
//! - **`ProviderError`**: failures reported by an external collaborator
//!   (metadata or metric provider) for a single call
//!
//! ## Error Philosophy
//!
//! Lineage builds are best effort:
//! - A single unavailable asset shouldn't prevent building the rest of the graph
//! - Provider failures are recorded on the graph, not thrown
//! - Only an unknown or completely unreachable seed escalates to the caller
//!
//! Budget exhaustion and insufficient metric history are not errors at all.
//! They surface as truncation metadata and empty results respectively.

use std::time::Duration;

use thiserror::Error;

use crate::domain::AssetId;

/// Result type for tributary operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for tributary operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The seed asset does not exist in the metadata provider or graph.
    #[error("invalid seed: asset {0} not found")]
    InvalidSeed(AssetId),

    /// The provider could not be reached for anything at all, so no
    /// partial result can be produced.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Invalid configuration or arguments.
    #[error("configuration error: {0}")]
    Config(String),

    /// Catalog fixture could not be parsed.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// A background analysis task panicked or was cancelled by the runtime.
    #[error("analysis task failed: {0}")]
    Task(String),

    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single call to an external provider.
///
/// The graph builder treats every variant as "node unavailable"; the split
/// exists so logs and build metadata can tell outages apart from bad data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The requested asset does not exist.
    #[error("asset {0} not found")]
    NotFound(AssetId),

    /// A failure that may succeed if retried later.
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// A failure that will not succeed on retry.
    #[error("permanent provider failure: {0}")]
    Permanent(String),

    /// The call did not complete within the configured timeout.
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    /// Returns `true` if the failure is plausibly temporary.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }
}
