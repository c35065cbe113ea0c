//! Pearson correlation between metrics of directly related assets.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stats::pearson;
use crate::domain::{AssetId, MetricSeries};
use crate::graph::LineageGraph;

/// Fewest shared timestamps a correlation is computed from.
pub const MIN_SHARED_POINTS: usize = 5;

/// Co-movement of two metric series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    /// Upstream asset
    pub source: AssetId,
    /// Upstream metric
    pub source_metric: String,
    /// Downstream asset
    pub target: AssetId,
    /// Downstream metric
    pub target_metric: String,
    /// Pearson r over shared timestamps, in [-1, 1]
    pub coefficient: f64,
    /// Number of shared timestamps
    pub samples: usize,
}

/// Correlate two series over the timestamps they share.
///
/// `None` with fewer than [`MIN_SHARED_POINTS`] shared timestamps or when
/// either side is constant over them.
#[must_use]
pub fn correlate(source: &MetricSeries, target: &MetricSeries) -> Option<Correlation> {
    let by_time: HashMap<DateTime<Utc>, f64> = target
        .points
        .iter()
        .map(|p| (p.timestamp, p.value))
        .collect();

    let (a, b): (Vec<f64>, Vec<f64>) = source
        .points
        .iter()
        .filter_map(|p| by_time.get(&p.timestamp).map(|&v| (p.value, v)))
        .unzip();

    if a.len() < MIN_SHARED_POINTS {
        return None;
    }
    let coefficient = pearson(&a, &b)?;

    Some(Correlation {
        source: source.asset_id.clone(),
        source_metric: source.metric.clone(),
        target: target.asset_id.clone(),
        target_metric: target.metric.clone(),
        coefficient,
        samples: a.len(),
    })
}

/// Correlations between every series of every directly related asset pair
/// whose `|r|` reaches `threshold`, strongest first.
#[must_use]
pub fn related_correlations(
    graph: &LineageGraph,
    series: &[MetricSeries],
    threshold: f64,
) -> Vec<Correlation> {
    let mut by_asset: BTreeMap<&AssetId, Vec<&MetricSeries>> = BTreeMap::new();
    for s in series.iter().filter(|s| !s.is_empty()) {
        by_asset.entry(&s.asset_id).or_default().push(s);
    }

    let mut pairs: Vec<(&AssetId, &AssetId)> = graph
        .relationships()
        .filter(|r| r.source != r.target)
        .map(|r| (&r.source, &r.target))
        .collect();
    pairs.sort();
    pairs.dedup();

    let mut found = Vec::new();
    for (source, target) in pairs {
        let (Some(upstream), Some(downstream)) = (by_asset.get(source), by_asset.get(target))
        else {
            continue;
        };
        for a in upstream {
            for b in downstream {
                if let Some(c) = correlate(a, b) {
                    if c.coefficient.abs() >= threshold {
                        found.push(c);
                    }
                }
            }
        }
    }

    found.sort_by(|a, b| {
        b.coefficient
            .abs()
            .total_cmp(&a.coefficient.abs())
            .then_with(|| (&a.source, &a.source_metric).cmp(&(&b.source, &b.source_metric)))
            .then_with(|| (&a.target, &a.target_metric).cmp(&(&b.target, &b.target_metric)))
    });
    found
}
