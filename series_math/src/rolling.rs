//! Window transforms over a regularly spaced series
//!
//! Contains:
//! - Rolling mean with a minimum number of observations
//! - Lagged difference
//! - Shift (lag or lead)

use crate::{is_observed, MathError, Result};
use std::collections::VecDeque;

/// Streaming rolling mean that skips gaps.
///
/// A value is only produced once the window holds at least `min_periods`
/// observations. With `min_periods == period` a single gap inside the window
/// makes the output a gap as well.
#[derive(Debug, Clone)]
pub struct RollingMean {
    period: usize,
    min_periods: usize,
    values: VecDeque<f64>,
    sum: f64,
    observed: usize,
}

impl RollingMean {
    /// Create a new rolling mean over `period` rows
    pub fn new(period: usize, min_periods: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }
        if min_periods == 0 || min_periods > period {
            return Err(MathError::InvalidInput(format!(
                "min_periods must be in 1..={}, got {}",
                period, min_periods
            )));
        }

        Ok(Self {
            period,
            min_periods,
            values: VecDeque::with_capacity(period),
            sum: 0.0,
            observed: 0,
        })
    }

    /// Push the next row and return the mean of the current window
    pub fn update(&mut self, value: f64) -> f64 {
        self.values.push_back(value);
        if is_observed(value) {
            self.sum += value;
            self.observed += 1;
        }

        if self.values.len() > self.period {
            if let Some(old) = self.values.pop_front() {
                if is_observed(old) {
                    self.sum -= old;
                    self.observed -= 1;
                }
            }
        }

        self.value()
    }

    /// Mean of the current window, `NaN` when too few observations
    pub fn value(&self) -> f64 {
        if self.observed < self.min_periods {
            return f64::NAN;
        }
        // Recompute when the window is complete to keep drift out of long runs.
        if self.observed == self.values.len() {
            return self.values.iter().sum::<f64>() / self.observed as f64;
        }
        self.sum / self.observed as f64
    }
}

/// Rolling mean over `window` rows requiring `min_periods` observations.
pub fn rolling_mean(values: &[f64], window: usize, min_periods: usize) -> Result<Vec<f64>> {
    let mut roller = RollingMean::new(window, min_periods)?;
    Ok(values.iter().map(|&v| roller.update(v)).collect())
}

/// Difference between each row and the row `lag` positions earlier.
pub fn diff(values: &[f64], lag: usize) -> Vec<f64> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if i < lag {
                f64::NAN
            } else {
                v - values[i - lag]
            }
        })
        .collect()
}

/// Move values by `periods` rows.
///
/// A positive shift lags the series (row `i` receives row `i - periods`), a
/// negative shift leads it (row `i` receives row `i + |periods|`). Rows with
/// no source become gaps.
pub fn shift(values: &[f64], periods: isize) -> Vec<f64> {
    let n = values.len() as isize;
    (0..n)
        .map(|i| {
            let source = i - periods;
            if source < 0 || source >= n {
                f64::NAN
            } else {
                values[source as usize]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rolling_mean_requires_full_window() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3, 3).unwrap();
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_relative_eq!(out[2], 2.0);
        assert_relative_eq!(out[3], 3.0);
    }

    #[test]
    fn test_rolling_mean_gap_blocks_strict_window() {
        let out = rolling_mean(&[1.0, f64::NAN, 3.0, 4.0, 5.0], 2, 2).unwrap();
        assert!(out[1].is_nan());
        assert!(out[2].is_nan());
        assert_relative_eq!(out[3], 3.5);
        assert_relative_eq!(out[4], 4.5);
    }

    #[test]
    fn test_rolling_mean_min_periods_one() {
        let out = rolling_mean(&[f64::NAN, 2.0, f64::NAN, 4.0], 3, 1).unwrap();
        assert!(out[0].is_nan());
        assert_relative_eq!(out[1], 2.0);
        assert_relative_eq!(out[2], 2.0);
        assert_relative_eq!(out[3], 3.0);
    }

    #[test]
    fn test_rolling_mean_rejects_bad_parameters() {
        assert!(RollingMean::new(0, 1).is_err());
        assert!(RollingMean::new(3, 0).is_err());
        assert!(RollingMean::new(3, 4).is_err());
    }

    #[test]
    fn test_diff_and_shift() {
        let values = [1.0, 3.0, 6.0, 10.0];
        let d = diff(&values, 2);
        assert!(d[0].is_nan() && d[1].is_nan());
        assert_eq!(&d[2..], &[5.0, 7.0]);

        let lagged = shift(&values, 1);
        assert!(lagged[0].is_nan());
        assert_eq!(&lagged[1..], &[1.0, 3.0, 6.0]);

        let led = shift(&values, -1);
        assert_eq!(&led[..3], &[3.0, 6.0, 10.0]);
        assert!(led[3].is_nan());
    }
}
