//! CLI value enums and domain type conversions.

use clap::ValueEnum;

use crate::analysis::AnomalySensitivity;
use crate::domain::{Direction, Granularity};

// ============================================================================
// Value Enums
// ============================================================================

/// Output format for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatArg {
    /// Human-readable text
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

impl std::fmt::Display for FormatArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Anomaly sensitivity for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensitivityArg {
    /// Only large deviations (k = 3.0 by default)
    Low,
    /// Balanced (k = 2.5 by default)
    Medium,
    /// Smaller deviations (k = 2.0 by default)
    High,
}

impl std::fmt::Display for SensitivityArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Traversal direction for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionArg {
    /// Towards sources
    #[value(alias = "incoming")]
    Upstream,
    /// Towards consumers
    #[value(alias = "outgoing")]
    Downstream,
    /// Either way
    Both,
}

impl std::fmt::Display for DirectionArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upstream => write!(f, "upstream"),
            Self::Downstream => write!(f, "downstream"),
            Self::Both => write!(f, "both"),
        }
    }
}

/// Metric resolution for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GranularityArg {
    /// Points as recorded
    Raw,
    /// Per-minute averages
    Minute,
    /// Per-hour averages
    Hour,
    /// Per-day averages
    Day,
}

impl std::fmt::Display for GranularityArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::Minute => write!(f, "minute"),
            Self::Hour => write!(f, "hour"),
            Self::Day => write!(f, "day"),
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<SensitivityArg> for AnomalySensitivity {
    fn from(s: SensitivityArg) -> Self {
        match s {
            SensitivityArg::Low => AnomalySensitivity::Low,
            SensitivityArg::Medium => AnomalySensitivity::Medium,
            SensitivityArg::High => AnomalySensitivity::High,
        }
    }
}

impl From<DirectionArg> for Direction {
    fn from(d: DirectionArg) -> Self {
        match d {
            DirectionArg::Upstream => Direction::Incoming,
            DirectionArg::Downstream => Direction::Outgoing,
            DirectionArg::Both => Direction::Both,
        }
    }
}

impl From<GranularityArg> for Granularity {
    fn from(g: GranularityArg) -> Self {
        match g {
            GranularityArg::Raw => Granularity::Raw,
            GranularityArg::Minute => Granularity::Minute,
            GranularityArg::Hour => Granularity::Hour,
            GranularityArg::Day => Granularity::Day,
        }
    }
}
