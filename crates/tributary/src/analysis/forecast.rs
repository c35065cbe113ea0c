//! Exponential smoothing forecasts with widening intervals.
//!
//! ## Model selection
//!
//! A least-squares slope is fitted over the whole history. If its t statistic
//! reaches `trend_t_threshold` the series is treated as trending and Holt's
//! double exponential smoothing is used; otherwise simple exponential
//! smoothing.
//!
//! ## Parameters
//!
//! `alpha` (and `beta` for the double model) are chosen by grid search over
//! `0.1..=0.9` in steps of `0.1`, minimising the sum of squared one-step-ahead
//! errors. Ties keep the smallest parameters, so results are deterministic.
//!
//! ## Intervals
//!
//! With `sigma` the standard deviation of the one-step errors, step `h` gets
//! `predicted ± z * sigma * h` and confidence `confidence * decay^(h - 1)`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::stats::linear_fit;
use crate::config::ForecastConfig;
use crate::domain::{AssetId, MetricSeries};

const GRID: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

/// Smoothing model used for a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastModel {
    /// Level only
    Simple,
    /// Level and trend (Holt)
    Double,
}

/// One projected observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Projected time
    pub timestamp: DateTime<Utc>,
    /// Point forecast
    pub predicted_value: f64,
    /// Lower interval bound
    pub lower_bound: f64,
    /// Upper interval bound
    pub upper_bound: f64,
    /// Confidence attached to the interval, decaying with horizon
    pub confidence: f64,
}

/// A forecast and the model that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Asset the series belongs to
    pub asset_id: AssetId,
    /// Metric name
    pub metric_name: String,
    /// Selected model
    pub model: ForecastModel,
    /// Level smoothing factor
    pub alpha: f64,
    /// Trend smoothing factor, for the double model
    pub beta: Option<f64>,
    /// Least-squares slope per point over the history
    pub slope: f64,
    /// t statistic of that slope
    pub slope_t: f64,
    /// Standard deviation of one-step-ahead errors
    pub residual_std: f64,
    /// Projected points; empty when history is too short
    pub points: Vec<ForecastPoint>,
}

impl Forecast {
    /// Returns `true` if there was too little history to forecast
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn insufficient(series: &MetricSeries) -> Self {
        Self {
            asset_id: series.asset_id.clone(),
            metric_name: series.metric.clone(),
            model: ForecastModel::Simple,
            alpha: 0.0,
            beta: None,
            slope: 0.0,
            slope_t: 0.0,
            residual_std: 0.0,
            points: Vec::new(),
        }
    }
}

/// Projects metric series forward.
#[derive(Debug, Clone, Default)]
pub struct TrendForecaster {
    config: ForecastConfig,
}

impl TrendForecaster {
    /// Create a forecaster with the given parameters.
    #[must_use]
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    /// Forecast `periods` points past the end of `series`.
    ///
    /// Series shorter than `min_points` yield an empty forecast. The
    /// horizon stops early, with fewer than `periods` points, once a
    /// projected timestamp would fall outside the representable range.
    #[must_use]
    pub fn forecast(&self, series: &MetricSeries, periods: usize) -> Forecast {
        let min_points = self.config.min_points.max(3);
        if series.len() < min_points {
            tracing::trace!(
                asset = %series.asset_id,
                metric = %series.metric,
                points = series.len(),
                "Not enough history to forecast"
            );
            return Forecast::insufficient(series);
        }

        let values = series.values();
        let Some(fit) = linear_fit(&values) else {
            return Forecast::insufficient(series);
        };
        let slope_t = fit.slope_t();
        let model = if slope_t.abs() >= self.config.trend_t_threshold {
            ForecastModel::Double
        } else {
            ForecastModel::Simple
        };

        let smoothed = match model {
            ForecastModel::Double => fit_double(&values),
            ForecastModel::Simple => fit_simple(&values),
        };
        let residual_std = (smoothed.sse / (values.len() - 1) as f64).sqrt();

        let step = mean_step(series);
        let Some(last) = series.points.last().map(|p| p.timestamp) else {
            return Forecast::insufficient(series);
        };

        let mut confidence = self.config.confidence;
        let points: Vec<ForecastPoint> = (1..=periods)
            .map_while(|h| {
                let timestamp = horizon_timestamp(last, step, h)?;
                let horizon = h as f64;
                let predicted = smoothed.level + smoothed.trend * horizon;
                let half_width = self.config.z * residual_std * horizon;
                let point = ForecastPoint {
                    timestamp,
                    predicted_value: predicted,
                    lower_bound: predicted - half_width,
                    upper_bound: predicted + half_width,
                    confidence,
                };
                confidence *= self.config.confidence_decay;
                Some(point)
            })
            .collect();
        if points.len() < periods {
            tracing::debug!(
                asset = %series.asset_id,
                metric = %series.metric,
                requested = periods,
                projected = points.len(),
                "Forecast horizon runs past the representable calendar"
            );
        }

        tracing::debug!(
            asset = %series.asset_id,
            metric = %series.metric,
            ?model,
            alpha = smoothed.alpha,
            residual_std,
            "Forecast computed"
        );

        Forecast {
            asset_id: series.asset_id.clone(),
            metric_name: series.metric.clone(),
            model,
            alpha: smoothed.alpha,
            beta: smoothed.beta,
            slope: fit.slope,
            slope_t,
            residual_std,
            points,
        }
    }
}

/// Final state of a fitted smoother.
struct Smoothed {
    alpha: f64,
    beta: Option<f64>,
    level: f64,
    trend: f64,
    sse: f64,
}

fn fit_simple(values: &[f64]) -> Smoothed {
    let mut best: Option<Smoothed> = None;
    for alpha in GRID {
        let mut level = values[0];
        let mut sse = 0.0;
        for &y in &values[1..] {
            sse += (y - level).powi(2);
            level = alpha * y + (1.0 - alpha) * level;
        }
        if best.as_ref().is_none_or(|b| sse < b.sse) {
            best = Some(Smoothed {
                alpha,
                beta: None,
                level,
                trend: 0.0,
                sse,
            });
        }
    }
    best.unwrap_or(Smoothed {
        alpha: GRID[0],
        beta: None,
        level: values[values.len() - 1],
        trend: 0.0,
        sse: 0.0,
    })
}

fn fit_double(values: &[f64]) -> Smoothed {
    let mut best: Option<Smoothed> = None;
    for alpha in GRID {
        for beta in GRID {
            let mut level = values[0];
            let mut trend = values[1] - values[0];
            let mut sse = 0.0;
            for &y in &values[1..] {
                sse += (y - (level + trend)).powi(2);
                let previous = level;
                level = alpha * y + (1.0 - alpha) * (level + trend);
                trend = beta * (level - previous) + (1.0 - beta) * trend;
            }
            if best.as_ref().is_none_or(|b| sse < b.sse) {
                best = Some(Smoothed {
                    alpha,
                    beta: Some(beta),
                    level,
                    trend,
                    sse,
                });
            }
        }
    }
    best.unwrap_or(Smoothed {
        alpha: GRID[0],
        beta: Some(GRID[0]),
        level: values[values.len() - 1],
        trend: 0.0,
        sse: 0.0,
    })
}

/// Timestamp `h` steps past `last`, or `None` once it leaves chrono's range.
fn horizon_timestamp(last: DateTime<Utc>, step: Duration, h: usize) -> Option<DateTime<Utc>> {
    let offset = step.checked_mul(i32::try_from(h).ok()?)?;
    last.checked_add_signed(offset)
}

/// Average spacing between observations.
fn mean_step(series: &MetricSeries) -> Duration {
    match (series.points.first(), series.points.last()) {
        (Some(first), Some(last)) if series.len() > 1 => {
            let span = last.timestamp - first.timestamp;
            span / i32::try_from(series.len() - 1).unwrap_or(i32::MAX)
        }
        _ => Duration::zero(),
    }
}
