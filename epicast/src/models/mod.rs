//! Model strategies driven by the forecast pipeline

use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2};
use std::fmt::Debug;

pub mod bayesian;
pub mod linalg;
pub mod scaler;

pub use bayesian::{BayesianLinear, FittedBayesianLinear};
pub use scaler::{Scaled, StandardScaler};

/// Quantile levels of a hub submission
pub const HUB_QUANTILES: [f64; 23] = [
    0.01, 0.025, 0.05, 0.1, 0.15, 0.2, 0.25, 0.3, 0.35, 0.4, 0.45, 0.5, 0.55, 0.6, 0.65, 0.7,
    0.75, 0.8, 0.85, 0.9, 0.95, 0.975, 0.99,
];

/// Quantile predictions, one row per instance and one column per level
#[derive(Debug, Clone)]
pub struct QuantilePredictions {
    levels: Vec<f64>,
    values: Array2<f64>,
}

impl QuantilePredictions {
    /// Create a new quantile table
    pub fn new(levels: Vec<f64>, values: Array2<f64>) -> Result<Self> {
        validate_levels(&levels)?;
        if values.ncols() != levels.len() {
            return Err(ForecastError::ValidationError(format!(
                "Quantile table has {} columns for {} levels",
                values.ncols(),
                levels.len()
            )));
        }
        Ok(Self { levels, values })
    }

    /// Get the quantile levels
    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    /// Get the table
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of instances
    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    /// `(level, value)` pairs of one instance
    pub fn row(&self, i: usize) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.levels
            .iter()
            .copied()
            .zip(self.values.row(i).into_iter().copied())
    }
}

/// Levels must lie strictly inside (0, 1)
pub fn validate_levels(levels: &[f64]) -> Result<()> {
    if levels.is_empty() {
        return Err(ForecastError::InvalidParameter(
            "At least one quantile level is required".to_string(),
        ));
    }
    if let Some(bad) = levels.iter().find(|q| !(**q > 0.0 && **q < 1.0)) {
        return Err(ForecastError::InvalidParameter(format!(
            "Quantile level {} is outside (0, 1)",
            bad
        )));
    }
    Ok(())
}

/// Fitted model strategy
pub trait FittedRegressor: Debug {
    /// Point prediction per row of `x`
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Predictive quantiles per row of `x`
    fn predict_proba(&self, x: &Array2<f64>, levels: &[f64]) -> Result<QuantilePredictions>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Model strategy that can be fitted to a feature matrix and target
pub trait Regressor: Debug + Clone {
    /// The type of fitted model produced
    type Fitted: FittedRegressor;

    /// Fit on rows of `x` against `y`
    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self::Fitted>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// Shape checks shared by every strategy
pub(crate) fn check_training_data(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(ForecastError::ValidationError(format!(
            "Feature rows ({}) don't match target length ({})",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 {
        return Err(ForecastError::ModelError(
            "Cannot fit on an empty training set".to_string(),
        ));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(ForecastError::ModelError(
            "Training data must be finite".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_quantiles_sorted_and_symmetric() {
        assert!(HUB_QUANTILES.windows(2).all(|w| w[0] < w[1]));
        for (lo, hi) in HUB_QUANTILES.iter().zip(HUB_QUANTILES.iter().rev()) {
            assert!((lo + hi - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_validate_levels() {
        assert!(validate_levels(&[0.5]).is_ok());
        assert!(validate_levels(&[]).is_err());
        assert!(validate_levels(&[0.0, 0.5]).is_err());
        assert!(validate_levels(&[f64::NAN]).is_err());
    }
}
