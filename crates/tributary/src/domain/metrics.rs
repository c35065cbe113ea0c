//! Metric time series types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::AssetId;

/// One observation in a metric series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Observation time
    pub timestamp: DateTime<Utc>,
    /// Observed value
    pub value: f64,
}

impl MetricPoint {
    /// Create a new metric point
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Ordered observations for one (asset, metric) pair.
///
/// Immutable once fetched for an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    /// Asset the metric belongs to
    pub asset_id: AssetId,
    /// Metric name
    pub metric: String,
    /// Observations in ascending timestamp order
    pub points: Vec<MetricPoint>,
}

impl MetricSeries {
    /// Create a series, sorting points by timestamp.
    #[must_use]
    pub fn new(asset_id: AssetId, metric: impl Into<String>, mut points: Vec<MetricPoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self {
            asset_id,
            metric: metric.into(),
            points,
        }
    }

    /// An empty series, returned when a provider has no data.
    #[must_use]
    pub fn empty(asset_id: AssetId, metric: impl Into<String>) -> Self {
        Self::new(asset_id, metric, Vec::new())
    }

    /// Number of observations
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the series has no observations
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Observed values in timestamp order
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Points that fall inside `range`.
    #[must_use]
    pub fn within(&self, range: &TimeRange) -> Self {
        Self {
            asset_id: self.asset_id.clone(),
            metric: self.metric.clone(),
            points: self
                .points
                .iter()
                .filter(|p| range.contains(p.timestamp))
                .copied()
                .collect(),
        }
    }

    /// Bucket-average points to the given granularity.
    ///
    /// Each bucket is stamped with its start time. `Granularity::Raw` returns
    /// the series unchanged.
    #[must_use]
    pub fn resample(&self, granularity: Granularity) -> Self {
        let Some(step) = granularity.step() else {
            return self.clone();
        };
        let step_secs = step.num_seconds();

        let mut points: Vec<MetricPoint> = Vec::new();
        let mut bucket_start: Option<i64> = None;
        let mut sum = 0.0;
        let mut count = 0_u32;

        for point in &self.points {
            let start = point.timestamp.timestamp().div_euclid(step_secs) * step_secs;
            if bucket_start != Some(start) {
                if let Some(previous) = bucket_start {
                    push_bucket(&mut points, previous, sum, count);
                }
                bucket_start = Some(start);
                sum = 0.0;
                count = 0;
            }
            sum += point.value;
            count += 1;
        }
        if let Some(previous) = bucket_start {
            push_bucket(&mut points, previous, sum, count);
        }

        Self {
            asset_id: self.asset_id.clone(),
            metric: self.metric.clone(),
            points,
        }
    }
}

fn push_bucket(points: &mut Vec<MetricPoint>, start: i64, sum: f64, count: u32) {
    if let Some(timestamp) = DateTime::<Utc>::from_timestamp(start, 0) {
        points.push(MetricPoint::new(timestamp, sum / f64::from(count)));
    }
}

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive start
    pub start: DateTime<Utc>,
    /// Exclusive end
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a new time range
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// A range covering every representable timestamp
    #[must_use]
    pub fn all() -> Self {
        Self {
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    /// The trailing window of `length` ending now
    ///
    /// Windows reaching past the earliest representable timestamp start there.
    #[must_use]
    pub fn last(length: Duration) -> Self {
        Self::ending_at(Utc::now(), length)
    }

    /// The window of `length` ending at `end`, clamped at the earliest
    /// representable timestamp
    #[must_use]
    pub fn ending_at(end: DateTime<Utc>, length: Duration) -> Self {
        Self {
            start: end
                .checked_sub_signed(length)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            end,
        }
    }

    /// Returns `true` if `timestamp` falls inside the range
    #[must_use]
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

/// Resolution at which a provider should return a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Points exactly as recorded
    #[default]
    Raw,
    /// One point per minute
    Minute,
    /// One point per hour
    Hour,
    /// One point per day
    Day,
}

impl Granularity {
    /// Bucket width, or `None` for raw data
    #[must_use]
    pub fn step(self) -> Option<Duration> {
        match self {
            Self::Raw => None,
            Self::Minute => Some(Duration::minutes(1)),
            Self::Hour => Some(Duration::hours(1)),
            Self::Day => Some(Duration::days(1)),
        }
    }
}
