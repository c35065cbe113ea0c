//! Tributary - data lineage analysis engine.
//!
//! This crate builds bounded lineage snapshots from a metadata provider and
//! runs analyses over them: impact, critical paths, metric anomalies,
//! forecasts, correlations and ranked insights. It ships as a library and as
//! the `tributary` CLI.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use tributary::config::EngineConfig;
//! use tributary::engine::{AnalysisRequest, LineageEngine};
//! use tributary::provider::InMemoryCatalog;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let catalog = InMemoryCatalog::load(Path::new("catalog.yaml")).await?;
//!     let engine = LineageEngine::with_provider(Arc::new(catalog), EngineConfig::default());
//!     let analysis = engine.run(&AnalysisRequest::new("orders_raw")).await?;
//!     for insight in &analysis.insights {
//!         println!("{} {:.2}", insight.id, insight.priority);
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod analysis;
pub mod cancel;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod graph;
pub mod provider;

// Public CLI module (needed by binary)
pub mod cli;

// Internal modules
pub(crate) mod output;

pub use engine::{Analysis, AnalysisRequest, FetchedSeries, LineageEngine, SeriesFailure};
pub use error::{Error, Result};
pub use graph::LineageGraph;
