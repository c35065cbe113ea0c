//! Statistical outliers in metric history.
//!
//! Two detectors run over the same trailing window:
//!
//! - **Point**: `|value - mean| > k * std` over the preceding `window` points.
//! - **Contextual**: the slope of the last `short_window` points differs from
//!   the slope of the last `window` points by more than `k` standard errors.
//!   Windows containing a point anomaly are skipped, since one outlier bends
//!   the short slope for as long as it stays inside.
//!
//! `k` comes from the requested [`AnomalySensitivity`]. Series shorter than
//! `2 * window` are not analyzed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stats::{EPSILON, linear_fit, mean, std_dev};
use crate::config::AnomalyConfig;
use crate::domain::{AssetId, MetricSeries, Severity};

/// Deviation reported when the trailing window is perfectly flat.
pub const MAX_DEVIATION: f64 = 100.0;

/// How eagerly to flag outliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySensitivity {
    /// Only flag large deviations
    Low,
    /// Balanced
    #[default]
    Medium,
    /// Flag smaller deviations
    High,
}

/// Which detector flagged the point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Value far from its trailing mean
    Point,
    /// Recent trend far from the longer trend
    Contextual,
}

/// A flagged observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Asset the series belongs to
    pub asset_id: AssetId,
    /// Metric name
    pub metric_name: String,
    /// Observation time
    pub timestamp: DateTime<Utc>,
    /// Observed value
    pub observed_value: f64,
    /// Value the trailing window predicted
    pub expected_value: f64,
    /// Signed distance from expectation, in standard deviations (point) or
    /// standard errors of the slope (contextual)
    pub deviation: f64,
    /// Graded by how far `deviation` exceeds the threshold
    pub severity: Severity,
    /// Detector that flagged the point
    pub kind: AnomalyKind,
}

/// Flags outliers in a single series.
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl AnomalyDetector {
    /// Create a detector with the given windows and multipliers.
    #[must_use]
    pub fn new(config: AnomalyConfig) -> Self {
        Self { config }
    }

    /// Standard-deviation multiplier for `sensitivity`.
    #[must_use]
    pub fn threshold(&self, sensitivity: AnomalySensitivity) -> f64 {
        match sensitivity {
            AnomalySensitivity::Low => self.config.k_low,
            AnomalySensitivity::Medium => self.config.k_medium,
            AnomalySensitivity::High => self.config.k_high,
        }
    }

    /// Flag anomalies in `series`, oldest first.
    ///
    /// Returns an empty list when the series has fewer than `2 * window`
    /// points.
    #[must_use]
    pub fn detect(&self, series: &MetricSeries, sensitivity: AnomalySensitivity) -> Vec<Anomaly> {
        let window = self.config.window;
        let short = self.config.short_window.min(window);
        if window < 2 || series.len() < 2 * window {
            tracing::trace!(
                asset = %series.asset_id,
                metric = %series.metric,
                points = series.len(),
                "Not enough history for anomaly detection"
            );
            return Vec::new();
        }

        let k = self.threshold(sensitivity);
        let values = series.values();
        let mut anomalies = Vec::new();
        let mut last_point: Option<usize> = None;
        let mut quiet_until = 0;

        for i in window..values.len() {
            let trailing = &values[i - window..i];
            let value = values[i];

            if let Some((expected, deviation)) = point_deviation(trailing, value, k) {
                anomalies.push(self.anomaly(series, i, expected, deviation, k, AnomalyKind::Point));
                last_point = Some(i);
                continue;
            }

            if i < quiet_until || last_point.is_some_and(|p| p + short > i) {
                continue;
            }
            if let Some((expected, deviation)) =
                contextual_deviation(&values[i + 1 - window..=i], short, k)
            {
                anomalies.push(self.anomaly(
                    series,
                    i,
                    expected,
                    deviation,
                    k,
                    AnomalyKind::Contextual,
                ));
                quiet_until = i + short;
            }
        }

        if !anomalies.is_empty() {
            tracing::debug!(
                asset = %series.asset_id,
                metric = %series.metric,
                count = anomalies.len(),
                ?sensitivity,
                "Anomalies detected"
            );
        }
        anomalies
    }

    fn anomaly(
        &self,
        series: &MetricSeries,
        index: usize,
        expected: f64,
        deviation: f64,
        k: f64,
        kind: AnomalyKind,
    ) -> Anomaly {
        let point = series.points[index];
        Anomaly {
            asset_id: series.asset_id.clone(),
            metric_name: series.metric.clone(),
            timestamp: point.timestamp,
            observed_value: point.value,
            expected_value: expected,
            deviation,
            severity: grade(deviation, k),
            kind,
        }
    }
}

/// `(expected, deviation)` if `value` is a point anomaly against `trailing`.
fn point_deviation(trailing: &[f64], value: f64, k: f64) -> Option<(f64, f64)> {
    let m = mean(trailing);
    let s = std_dev(trailing);
    let diff = value - m;

    if s <= EPSILON {
        // Any departure from a flat window is significant.
        let scale = m.abs().max(1.0);
        return (diff.abs() > EPSILON * scale).then_some((m, MAX_DEVIATION.copysign(diff)));
    }

    let deviation = diff / s;
    (deviation.abs() > k).then_some((m, deviation.clamp(-MAX_DEVIATION, MAX_DEVIATION)))
}

/// `(expected, deviation)` if the short-term slope of `window` departs from
/// its long-term slope. The last element of `window` is the current point.
fn contextual_deviation(window: &[f64], short: usize, k: f64) -> Option<(f64, f64)> {
    let long_fit = linear_fit(window)?;
    let short_fit = linear_fit(&window[window.len() - short..])?;

    let se = long_fit.residual_std / short_fit.sxx.sqrt();
    if se <= EPSILON {
        return None;
    }
    let deviation = (short_fit.slope - long_fit.slope) / se;
    if deviation.abs() <= k {
        return None;
    }
    let expected = long_fit.predict((window.len() - 1) as f64);
    Some((expected, deviation.clamp(-MAX_DEVIATION, MAX_DEVIATION)))
}

/// Grade by how far past the threshold the deviation lies.
fn grade(deviation: f64, k: f64) -> Severity {
    let ratio = deviation.abs() / k;
    if ratio <= 1.25 {
        Severity::Low
    } else if ratio <= 1.5 {
        Severity::Medium
    } else if ratio <= 2.0 {
        Severity::High
    } else {
        Severity::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MetricPoint;
    use chrono::Duration;
    use rstest::rstest;

    fn series(values: &[f64]) -> MetricSeries {
        let start = DateTime::<Utc>::UNIX_EPOCH;
        MetricSeries::new(
            AssetId::new("orders"),
            "rows",
            values
                .iter()
                .enumerate()
                .map(|(i, v)| MetricPoint::new(start + Duration::hours(i as i64), *v))
                .collect(),
        )
    }

    fn alternating(i: usize) -> f64 {
        if i % 2 == 0 { 0.1 } else { -0.1 }
    }

    #[rstest]
    fn constant_series_has_no_anomalies(
        #[values(AnomalySensitivity::Low, AnomalySensitivity::Medium, AnomalySensitivity::High)]
        sensitivity: AnomalySensitivity,
    ) {
        let anomalies = AnomalyDetector::default().detect(&series(&[42.0; 90]), sensitivity);
        assert!(anomalies.is_empty());
    }

    #[test]
    fn short_series_is_not_analyzed() {
        let mut values = vec![1.0; 59];
        values[58] = 1_000.0;
        let anomalies = AnomalyDetector::default().detect(&series(&values), AnomalySensitivity::High);
        assert!(anomalies.is_empty());
    }

    #[rstest]
    fn spike_is_a_single_point_anomaly(
        #[values(AnomalySensitivity::Low, AnomalySensitivity::Medium, AnomalySensitivity::High)]
        sensitivity: AnomalySensitivity,
    ) {
        let mut values = vec![10.0; 100];
        values[65] = 50.0;

        let anomalies = AnomalyDetector::default().detect(&series(&values), sensitivity);

        assert_eq!(anomalies.len(), 1, "{anomalies:?}");
        let spike = &anomalies[0];
        assert_eq!(spike.kind, AnomalyKind::Point);
        assert!((spike.observed_value - 50.0).abs() < f64::EPSILON);
        assert!((spike.expected_value - 10.0).abs() < 1e-9);
        assert!(spike.deviation > 0.0);
        assert_eq!(spike.severity, Severity::Critical);
    }

    #[test]
    fn noisy_outlier_is_graded() {
        // Alternating +-1 around 10 has std 1; 13.2 sits 3.2 deviations out.
        let mut values: Vec<f64> = (0..80).map(|i| 10.0 + 10.0 * alternating(i)).collect();
        values[70] = 13.2;

        let anomalies = AnomalyDetector::default().detect(&series(&values), AnomalySensitivity::Low);

        let point: Vec<_> = anomalies
            .iter()
            .filter(|a| a.kind == AnomalyKind::Point)
            .collect();
        assert_eq!(point.len(), 1);
        assert!((point[0].deviation - 3.2).abs() < 1e-6);
        assert_eq!(point[0].severity, Severity::Low);
    }

    #[test]
    fn trend_break_is_contextual() {
        // Rises by one per point, then flattens at 60.
        let values: Vec<f64> = (0..100)
            .map(|i| i.min(60) as f64 + alternating(i))
            .collect();

        let anomalies = AnomalyDetector::default().detect(&series(&values), AnomalySensitivity::High);

        assert!(anomalies.iter().all(|a| a.kind == AnomalyKind::Contextual));
        let first = anomalies.first().expect("trend break should be flagged");
        let index = (first.timestamp - DateTime::<Utc>::UNIX_EPOCH).num_hours();
        assert!((61..=66).contains(&index), "flagged at {index}");
        assert!(first.deviation < 0.0);
    }

    #[rstest]
    #[case(2.1, Severity::Low)]
    #[case(2.9, Severity::Medium)]
    #[case(3.5, Severity::High)]
    #[case(-4.5, Severity::Critical)]
    fn severity_grades_relative_to_threshold(#[case] deviation: f64, #[case] expected: Severity) {
        assert_eq!(grade(deviation, 2.0), expected);
    }

    #[test]
    fn thresholds_follow_config() {
        let detector = AnomalyDetector::default();
        assert!((detector.threshold(AnomalySensitivity::Low) - 3.0).abs() < f64::EPSILON);
        assert!((detector.threshold(AnomalySensitivity::Medium) - 2.5).abs() < f64::EPSILON);
        assert!((detector.threshold(AnomalySensitivity::High) - 2.0).abs() < f64::EPSILON);
    }
}
