//! Small descriptive statistics shared by the series analyzers.
//!
//! Everything here is a pure function over `f64` slices. Sample positions
//! `0..n` stand in for time, so fits are in units per point.

/// Values closer than this are treated as equal.
pub(crate) const EPSILON: f64 = 1e-9;

/// Arithmetic mean. `0.0` for an empty slice.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation. `0.0` for fewer than two values.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Ordinary least squares fit of `values` against their positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Residual standard error, `sqrt(SSE / (n - 2))`
    pub residual_std: f64,
    /// Sum of squared position deviations, `n(n² - 1) / 12`
    pub sxx: f64,
}

impl LinearFit {
    /// Standard error of the slope.
    pub fn slope_std_error(&self) -> f64 {
        if self.sxx <= 0.0 {
            return 0.0;
        }
        self.residual_std / self.sxx.sqrt()
    }

    /// t statistic of the slope against zero.
    ///
    /// A perfect fit has zero standard error; its slope is then infinitely
    /// significant unless it is itself zero.
    pub fn slope_t(&self) -> f64 {
        let se = self.slope_std_error();
        if se <= EPSILON {
            if self.slope.abs() <= EPSILON {
                0.0
            } else {
                f64::INFINITY.copysign(self.slope)
            }
        } else {
            self.slope / se
        }
    }

    /// Fitted value at position `x`.
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fit a line through `values`. `None` for fewer than three points.
pub(crate) fn linear_fit(values: &[f64]) -> Option<LinearFit> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = mean(values);

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxx += dx * dx;
        sxy += dx * (y - y_mean);
    }
    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let sse: f64 = values
        .iter()
        .enumerate()
        .map(|(i, y)| (y - (intercept + slope * i as f64)).powi(2))
        .sum();

    Some(LinearFit {
        slope,
        intercept,
        residual_std: (sse / (nf - 2.0)).sqrt(),
        sxx,
    })
}

/// Pearson correlation coefficient of two equally long slices.
///
/// `None` when the slices differ in length, have fewer than three values,
/// or either one is constant.
pub(crate) fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 3 {
        return None;
    }
    let (ma, mb) = (mean(a), mean(b));
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - ma, y - mb);
        cov += dx * dy;
        va += dx * dx;
        vb += dy * dy;
    }
    if va <= EPSILON || vb <= EPSILON {
        return None;
    }
    Some((cov / (va * vb).sqrt()).clamp(-1.0, 1.0))
}
