//! Numeric helpers shared by baseline construction and the anomaly engine
//!
//! Every function is total: empty or degenerate input yields a documented
//! default (usually 0.0) instead of an error or NaN.

use std::cmp::Ordering;

/// Euclidean norm of a three-axis reading
pub fn magnitude(ax: f64, ay: f64, az: f64) -> f64 {
    (ax * ax + ay * ay + az * az).sqrt()
}

/// Element-wise magnitude of three parallel axis series
pub fn magnitudes(ax: &[f64], ay: &[f64], az: &[f64]) -> Vec<f64> {
    ax.iter()
        .zip(ay)
        .zip(az)
        .map(|((x, y), z)| magnitude(*x, *y, *z))
        .collect()
}

/// Arithmetic mean, 0 for empty input
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation, 0 for empty input
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Smallest value, 0 for empty input
pub fn min(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .unwrap_or(0.0)
}

/// Largest value, 0 for empty input
pub fn max(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .unwrap_or(0.0)
}

/// Root mean square, 0 for empty input
pub fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

/// Coefficient of variation as a percentage, 0 when the mean is 0
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values);
    if values.is_empty() || m == 0.0 {
        return 0.0;
    }
    std_dev(values) / m * 100.0
}

/// Percentile `p` (0-100) with linear interpolation between closest ranks
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    percentile_sorted(&sorted, p)
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Several percentiles at once, returned in the order requested
pub fn percentiles(values: &[f64], ps: &[f64]) -> Vec<(f64, f64)> {
    if values.is_empty() {
        return ps.iter().map(|p| (*p, 0.0)).collect();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    ps.iter()
        .map(|p| (*p, percentile_sorted(&sorted, *p)))
        .collect()
}

pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

/// Max minus min, 0 for empty input
pub fn peak_to_peak(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    max(values) - min(values)
}

/// Sample skewness; 0 for fewer than 3 values or zero spread
pub fn skewness(values: &[f64]) -> f64 {
    standardized_moment(values, 3, 3)
}

/// Excess kurtosis; 0 for fewer than 4 values or zero spread
pub fn kurtosis(values: &[f64]) -> f64 {
    if values.len() < 4 {
        return 0.0;
    }
    let moment = standardized_moment(values, 4, 4);
    if moment == 0.0 {
        return 0.0;
    }
    moment - 3.0
}

fn standardized_moment(values: &[f64], order: i32, min_len: usize) -> f64 {
    if values.len() < min_len {
        return 0.0;
    }
    let m = mean(values);
    let sd = std_dev(values);
    if sd == 0.0 {
        return 0.0;
    }
    mean(
        &values
            .iter()
            .map(|v| ((v - m) / sd).powi(order))
            .collect::<Vec<_>>(),
    )
}

/// Signed distance from a baseline mean in baseline standard deviations
pub fn z_score(value: f64, baseline_mean: f64, baseline_std: f64) -> f64 {
    if baseline_std == 0.0 {
        return 0.0;
    }
    (value - baseline_mean) / baseline_std
}

/// Least-squares slope of `values` against `times` (units per second).
///
/// Times are re-based to the first sample to keep epoch-sized timestamps
/// from eating the precision. Returns 0 for fewer than two points or when
/// all timestamps coincide.
pub fn linear_regression_slope(times: &[f64], values: &[f64]) -> f64 {
    let n = times.len().min(values.len());
    if n < 2 {
        return 0.0;
    }
    let t0 = times[0];
    let xs: Vec<f64> = times[..n].iter().map(|t| t - t0).collect();
    let ys = &values[..n];

    let mean_x = mean(&xs);
    let mean_y = mean(ys);

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        sxx += dx * dx;
        sxy += dx * (y - mean_y);
    }

    if sxx < f64::EPSILON {
        return 0.0;
    }
    sxy / sxx
}
