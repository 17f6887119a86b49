//! Cross-sectional statistics that ignore gaps

use crate::is_observed;

/// Number of observed values.
pub fn nan_count(values: &[f64]) -> usize {
    values.iter().filter(|v| is_observed(**v)).count()
}

/// Sum of observed values; zero when nothing is observed.
pub fn nan_sum(values: &[f64]) -> f64 {
    values.iter().filter(|v| is_observed(**v)).sum()
}

/// Mean of observed values; `NaN` when nothing is observed.
pub fn nan_mean(values: &[f64]) -> f64 {
    let count = nan_count(values);
    if count == 0 {
        return f64::NAN;
    }
    nan_sum(values) / count as f64
}

/// Standard deviation of observed values with `ddof` degrees of freedom
/// removed; `NaN` when fewer than `ddof + 1` values are observed.
pub fn nan_std(values: &[f64], ddof: usize) -> f64 {
    let count = nan_count(values);
    if count <= ddof {
        return f64::NAN;
    }
    let mean = nan_mean(values);
    let ss: f64 = values
        .iter()
        .filter(|v| is_observed(**v))
        .map(|v| (v - mean).powi(2))
        .sum();
    (ss / (count - ddof) as f64).sqrt()
}

/// Clip window `mean ± threshold · std` of the observed values.
///
/// Returns `None` when the spread is undefined, in which case nothing should
/// be clipped.
pub fn winsor_bounds(values: &[f64], threshold: f64) -> Option<(f64, f64)> {
    let mean = nan_mean(values);
    let spread = nan_std(values, 1);
    if mean.is_nan() || spread.is_nan() {
        return None;
    }
    Some((mean - threshold * spread, mean + threshold * spread))
}

/// Raise observed values below `lower` to `lower`; gaps are untouched.
pub fn clip_lower(values: &mut [f64], lower: f64) {
    for v in values.iter_mut() {
        if is_observed(*v) && *v < lower {
            *v = lower;
        }
    }
}
