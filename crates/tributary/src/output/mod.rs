//! Output formatting for CLI commands.
//!
//! Every command result can be printed as human-readable text or as pretty
//! JSON. Text renderers write to any `io::Write` so they can be tested
//! against a buffer.

mod color;

use std::env;
use std::io::{self, Write};

use serde::Serialize;

use crate::analysis::{Anomaly, CriticalPathReport, Forecast, ImpactReport, Insight};
use crate::graph::{LineageGraph, TruncationReason};

pub use color::warning;
use color::{bold, colorize_id, colorize_severity, dimmed};

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

/// Settings that control text rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Read settings from the environment.
    ///
    /// Colors are off when `NO_COLOR` is set or `TRIBUTARY_COLOR` is `0` or
    /// `false`.
    pub fn from_env() -> Self {
        let use_colors = env::var("NO_COLOR").is_err()
            && env::var("TRIBUTARY_COLOR")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true);
        Self { use_colors }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { use_colors: true }
    }
}

/// Print a JSON-formatted result for any serializable value
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_json(&mut handle, value)
}

fn write_json<W: Write, T: Serialize>(w: &mut W, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(w, "{json}")
}

/// Run `render` against locked stdout with settings from the environment.
pub fn print_text<F>(render: F) -> io::Result<()>
where
    F: FnOnce(&mut io::StdoutLock<'_>, &OutputConfig) -> io::Result<()>,
{
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    render(&mut handle, &OutputConfig::from_env())
}

// ============================================================================
// Text Formatting
// ============================================================================

/// Render a snapshot: assets, relationships, cycles and truncation reasons.
pub fn write_graph<W: Write>(w: &mut W, graph: &LineageGraph, config: &OutputConfig) -> io::Result<()> {
    let summary = graph.summary();
    writeln!(
        w,
        "{} {}",
        bold("Lineage of", config),
        colorize_id(graph.seed().as_str(), config)
    )?;
    writeln!(
        w,
        "  {} assets, {} relationships, {} boundary, depth {}",
        summary.assets,
        summary.relationships,
        summary.boundary,
        graph.depth_reached()
    )?;

    writeln!(w)?;
    writeln!(w, "{}", bold("Assets:", config))?;
    for asset in graph.assets() {
        let partial = if asset.is_partial() {
            format!(" {}", warning("(partial)", config))
        } else {
            String::new()
        };
        writeln!(
            w,
            "  {} [{}, {}, {}]{}",
            colorize_id(asset.id.as_str(), config),
            asset.kind,
            asset.status,
            dimmed(&asset.sensitivity.to_string(), config),
            partial
        )?;
    }

    writeln!(w)?;
    writeln!(w, "{}", bold("Relationships:", config))?;
    for rel in graph.relationships() {
        writeln!(
            w,
            "  {} -> {} ({}, {:.2})",
            colorize_id(rel.source.as_str(), config),
            colorize_id(rel.target.as_str(), config),
            rel.kind,
            rel.confidence
        )?;
    }
    for rel in graph.boundary() {
        writeln!(
            w,
            "  {}",
            dimmed(&format!("{} -> {} (boundary)", rel.source, rel.target), config)
        )?;
    }

    let cycles = graph.cycles();
    if !cycles.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}", bold("Cycles:", config))?;
        for cycle in cycles {
            let ids: Vec<&str> = cycle.iter().map(|id| id.as_str()).collect();
            writeln!(w, "  {}", ids.join(", "))?;
        }
    }

    if graph.is_truncated() {
        writeln!(w)?;
        writeln!(w, "{}", warning("Truncated:", config))?;
        for reason in &graph.metadata().reasons {
            writeln!(w, "  {}", describe_truncation(reason))?;
        }
    }
    Ok(())
}

fn describe_truncation(reason: &TruncationReason) -> String {
    match reason {
        TruncationReason::NodeLimit { limit } => format!("node limit of {limit} reached"),
        TruncationReason::EdgeLimit { limit } => format!("edge limit of {limit} reached"),
        TruncationReason::ProviderUnavailable { level } => {
            format!("provider unavailable at level {level}")
        }
        TruncationReason::PartialFetch { assets } => {
            let ids: Vec<&str> = assets.iter().map(|id| id.as_str()).collect();
            format!("fetch failed for {}", ids.join(", "))
        }
        TruncationReason::Cancelled => "cancelled".to_string(),
        TruncationReason::DeadlineExceeded => "deadline exceeded".to_string(),
    }
}

/// Render an impact report.
pub fn write_impact<W: Write>(w: &mut W, report: &ImpactReport, config: &OutputConfig) -> io::Result<()> {
    writeln!(
        w,
        "{} {}: {} ({:.2})",
        bold("Impact of", config),
        colorize_id(report.seed_id.as_str(), config),
        colorize_severity(report.severity_level(), config),
        report.severity
    )?;
    for (title, assets) in [("Upstream", &report.upstream), ("Downstream", &report.downstream)] {
        writeln!(w)?;
        writeln!(w, "{} ({}):", bold(title, config), assets.len())?;
        for (id, hops) in assets {
            writeln!(w, "  {} {}", colorize_id(id.as_str(), config), dimmed(&format!("{hops} hop(s)"), config))?;
        }
    }
    if !report.sensitive_downstream.is_empty() {
        let ids: Vec<&str> = report.sensitive_downstream.iter().map(|id| id.as_str()).collect();
        writeln!(w)?;
        writeln!(w, "{} {}", bold("Sensitive:", config), ids.join(", "))?;
    }
    if !report.failing_downstream.is_empty() {
        let ids: Vec<&str> = report.failing_downstream.iter().map(|id| id.as_str()).collect();
        writeln!(w, "{} {}", bold("Failing:", config), ids.join(", "))?;
    }
    Ok(())
}

/// Render ranked critical paths.
pub fn write_paths<W: Write>(w: &mut W, report: &CriticalPathReport, config: &OutputConfig) -> io::Result<()> {
    if report.paths.is_empty() {
        writeln!(w, "No critical paths found.")?;
    }
    for (rank, path) in report.paths.iter().enumerate() {
        let chain: Vec<String> = path
            .assets
            .iter()
            .map(|id| colorize_id(id.as_str(), config))
            .collect();
        writeln!(
            w,
            "{:>2}. {} {:.3} {}",
            rank + 1,
            colorize_severity(path.risk_level, config),
            path.score,
            chain.join(" -> ")
        )?;
        writeln!(
            w,
            "    {}",
            dimmed(
                &format!(
                    "weakest link {} -> {} ({:.2})",
                    path.weakest_link.source, path.weakest_link.target, path.weakest_link.confidence
                ),
                config
            )
        )?;
    }
    if report.truncated {
        writeln!(
            w,
            "{}",
            warning(&format!("Search stopped after {} extensions", report.explored), config)
        )?;
    }
    Ok(())
}

pub fn write_anomalies<W: Write>(w: &mut W, anomalies: &[Anomaly], config: &OutputConfig) -> io::Result<()> {
    if anomalies.is_empty() {
        writeln!(w, "No anomalies found.")?;
        return Ok(());
    }
    for anomaly in anomalies {
        writeln!(
            w,
            "{} {}:{} {:?} observed {:.3}, expected {:.3} ({:+.2})",
            anomaly.timestamp.format("%Y-%m-%d %H:%M"),
            colorize_id(anomaly.asset_id.as_str(), config),
            anomaly.metric_name,
            anomaly.kind,
            anomaly.observed_value,
            anomaly.expected_value,
            anomaly.deviation
        )?;
        writeln!(w, "    {}", colorize_severity(anomaly.severity, config))?;
    }
    Ok(())
}

/// Render a forecast, or a note when history was too short.
pub fn write_forecast<W: Write>(w: &mut W, forecast: &Forecast, config: &OutputConfig) -> io::Result<()> {
    if forecast.is_empty() {
        writeln!(
            w,
            "{}",
            warning(
                &format!("Not enough history to forecast {}:{}", forecast.asset_id, forecast.metric_name),
                config
            )
        )?;
        return Ok(());
    }
    writeln!(
        w,
        "{} {}:{} ({:?}, alpha {:.1}, slope {:.3})",
        bold("Forecast", config),
        colorize_id(forecast.asset_id.as_str(), config),
        forecast.metric_name,
        forecast.model,
        forecast.alpha,
        forecast.slope
    )?;
    for point in &forecast.points {
        writeln!(
            w,
            "  {} {:.3} [{:.3}, {:.3}] {}",
            point.timestamp.format("%Y-%m-%d %H:%M"),
            point.predicted_value,
            point.lower_bound,
            point.upper_bound,
            dimmed(&format!("{:.0}%", point.confidence * 100.0), config)
        )?;
    }
    Ok(())
}

/// Render insights in priority order.
pub fn write_insights<W: Write>(w: &mut W, insights: &[Insight], config: &OutputConfig) -> io::Result<()> {
    if insights.is_empty() {
        writeln!(w, "No insights.")?;
        return Ok(());
    }
    for insight in insights {
        writeln!(
            w,
            "{:.2} {} {} {}",
            insight.priority,
            colorize_severity(insight.severity, config),
            bold(&insight.kind.to_string(), config),
            insight.id
        )?;
        let affected: Vec<String> = insight
            .affected_asset_ids
            .iter()
            .map(|id| colorize_id(id.as_str(), config))
            .collect();
        writeln!(w, "    {} {}", dimmed("assets:", config), affected.join(", "))?;
        let recommendations: Vec<String> = insight
            .recommendations
            .iter()
            .map(|r| format!("{r:?}"))
            .collect();
        writeln!(w, "    {} {}", dimmed("recommend:", config), recommendations.join(", "))?;
    }
    Ok(())
}
