//! Color and styling helpers for CLI output.
//!
//! Semantic Color Theme:
//!   - Critical:  red bold
//!   - High:      red
//!   - Medium:    yellow
//!   - Low:       green
//!   - Reference: cyan (asset ids)
//!   - Muted:     dimmed (labels, boundary edges)

use colored::Colorize;

use super::OutputConfig;
use crate::domain::Severity;

/// Apply semantic "warning" color (yellow) to text.
pub fn warning(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.yellow().to_string()
}

/// Colorize an asset id (cyan).
pub(crate) fn colorize_id(id: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return id.to_string();
    }
    id.cyan().to_string()
}

/// Color a severity label by how urgent it is.
pub(crate) fn colorize_severity(severity: Severity, config: &OutputConfig) -> String {
    let text = severity.to_string();
    if !config.use_colors {
        return text;
    }
    match severity {
        Severity::Critical => text.red().bold().to_string(),
        Severity::High => text.red().to_string(),
        Severity::Medium => text.yellow().to_string(),
        Severity::Low => text.green().to_string(),
    }
}

pub(crate) fn bold(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.bold().to_string()
}

pub(crate) fn dimmed(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.dimmed().to_string()
}
