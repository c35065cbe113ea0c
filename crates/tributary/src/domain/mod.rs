//! Domain types for lineage analysis.
//!
//! Assets and relationships are closed, tagged types with mandatory fields so
//! every consumer can handle all kinds exhaustively.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod metrics;

pub use metrics::{Granularity, MetricPoint, MetricSeries, TimeRange};

/// Stable, opaque identifier for an asset.
///
/// Ordering is lexicographic and is used for deterministic tie-breaking.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    /// Create a new asset ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of governed data object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Physical table
    Table,
    /// Logical or materialized view
    View,
    /// ETL / ELT pipeline
    Pipeline,
    /// BI dashboard
    Dashboard,
    /// Scheduled report
    Report,
    /// API endpoint
    Api,
    /// Flat file or object
    File,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Table => "table",
            Self::View => "view",
            Self::Pipeline => "pipeline",
            Self::Dashboard => "dashboard",
            Self::Report => "report",
            Self::Api => "api",
            Self::File => "file",
        };
        f.write_str(label)
    }
}

/// Operational status of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    /// Healthy and in use
    Active,
    /// Scheduled for removal
    Deprecated,
    /// Currently failing
    Error,
    /// Degraded
    Warning,
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Active => "active",
            Self::Deprecated => "deprecated",
            Self::Error => "error",
            Self::Warning => "warning",
        };
        f.write_str(label)
    }
}

/// Data classification, ordered from least to most sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    /// Publicly shareable
    Public,
    /// Internal use only
    Internal,
    /// Confidential business data
    Confidential,
    /// Regulated or restricted data
    Restricted,
}

impl Sensitivity {
    /// Business-impact weight in `[0, 1]` used when ranking insights.
    #[must_use]
    pub fn weight(self) -> f64 {
        match self {
            Self::Public => 0.1,
            Self::Internal => 0.3,
            Self::Confidential => 0.7,
            Self::Restricted => 1.0,
        }
    }
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Public => "public",
            Self::Internal => "internal",
            Self::Confidential => "confidential",
            Self::Restricted => "restricted",
        };
        f.write_str(label)
    }
}

/// Shared four-level severity scale, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Low,
    /// Worth a look
    Medium,
    /// Needs attention
    High,
    /// Needs attention now
    Critical,
}

impl Severity {
    /// Numeric score in `[0, 1]` used when ranking insights.
    #[must_use]
    pub fn score(self) -> f64 {
        match self {
            Self::Low => 0.25,
            Self::Medium => 0.5,
            Self::High => 0.75,
            Self::Critical => 1.0,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// Why an asset in a snapshot is incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialReason {
    /// The asset record itself could not be fetched; descriptive fields are placeholders.
    AssetUnavailable,
    /// The asset's relationships could not be fetched; some edges may be missing.
    RelationshipsUnavailable,
}

/// Asset record as returned by a metadata provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Asset identifier
    pub id: AssetId,
    /// Asset kind
    pub kind: AssetKind,
    /// Current status
    pub status: AssetStatus,
    /// Data classification
    pub sensitivity: Sensitivity,
    /// Names of metrics available for this asset
    #[serde(default)]
    pub metrics: Vec<String>,
}

/// A node in a lineage snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset identifier
    pub id: AssetId,
    /// Asset kind
    pub kind: AssetKind,
    /// Current status
    pub status: AssetStatus,
    /// Data classification
    pub sensitivity: Sensitivity,
    /// Names of metric series available for this asset
    pub metric_series: BTreeSet<String>,
    /// Set when a provider call for this asset failed during the build
    pub partial: Option<PartialReason>,
}

impl Asset {
    /// Placeholder for an asset whose record could not be fetched.
    ///
    /// Descriptive fields are conservative defaults; `partial` is always set.
    #[must_use]
    pub fn placeholder(id: AssetId) -> Self {
        Self {
            id,
            kind: AssetKind::Table,
            status: AssetStatus::Warning,
            sensitivity: Sensitivity::Internal,
            metric_series: BTreeSet::new(),
            partial: Some(PartialReason::AssetUnavailable),
        }
    }

    /// Returns `true` if a provider call for this asset failed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.partial.is_some()
    }
}

impl From<AssetRecord> for Asset {
    fn from(record: AssetRecord) -> Self {
        Self {
            id: record.id,
            kind: record.kind,
            status: record.status,
            sensitivity: record.sensitivity,
            metric_series: record.metrics.into_iter().collect(),
            partial: None,
        }
    }
}

/// Type of relationship between assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Data physically moves from source to target
    DataFlow,
    /// Target cannot function without source
    Dependency,
    /// Target is computed from source
    Transformation,
    /// Informational link
    Reference,
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::DataFlow => "data_flow",
            Self::Dependency => "dependency",
            Self::Transformation => "transformation",
            Self::Reference => "reference",
        };
        f.write_str(label)
    }
}

/// Which edges to follow from a node.
///
/// Edges point from upstream (source) to downstream (target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Follow edges against their direction (towards upstream sources)
    Incoming,
    /// Follow edges along their direction (towards downstream consumers)
    Outgoing,
    /// Follow edges either way
    #[default]
    Both,
}

impl Direction {
    /// The opposite traversal direction; `Both` is its own reverse.
    #[must_use]
    pub fn reversed(self) -> Self {
        match self {
            Self::Incoming => Self::Outgoing,
            Self::Outgoing => Self::Incoming,
            Self::Both => Self::Both,
        }
    }
}

/// Relationship record as returned by a metadata provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    /// Upstream end of the edge
    pub source: AssetId,
    /// Downstream end of the edge
    pub target: AssetId,
    /// Relationship kind
    pub kind: RelationshipKind,
    /// Confidence in `[0, 1]`; values outside the range are clamped on build
    pub confidence: f64,
    /// Last time the provider observed this relationship
    pub last_updated: DateTime<Utc>,
}

/// A directed, typed, confidence-weighted edge in a lineage snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Upstream end of the edge
    pub source: AssetId,
    /// Downstream end of the edge
    pub target: AssetId,
    /// Relationship kind
    pub kind: RelationshipKind,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
    /// Last time the provider observed this relationship
    pub last_updated: DateTime<Utc>,
}

/// Identity of a relationship for deduplication: same endpoints and kind.
pub type RelationshipKey = (AssetId, AssetId, RelationshipKind);

impl Relationship {
    /// Identity used to deduplicate edges fetched more than once.
    #[must_use]
    pub fn key(&self) -> RelationshipKey {
        (self.source.clone(), self.target.clone(), self.kind)
    }
}

impl From<RelationshipRecord> for Relationship {
    fn from(record: RelationshipRecord) -> Self {
        let confidence = if record.confidence.is_nan() {
            0.0
        } else {
            record.confidence.clamp(0.0, 1.0)
        };
        Self {
            source: record.source,
            target: record.target,
            kind: record.kind,
            confidence,
            last_updated: record.last_updated,
        }
    }
}
