//! Conjugate Bayesian linear regression
//!
//! Normal-Inverse-Gamma prior on the coefficients and noise variance:
//!
//! - `beta | sigma² ~ N(0, sigma² / lambda · I)` (intercept included)
//! - `sigma² ~ InvGamma(a0, b0)`
//!
//! The posterior is closed form, and the posterior predictive of a new row
//! is a Student-t, which gives exact quantiles without sampling.

use super::linalg::CholeskyFactor;
use super::{check_training_data, validate_levels, FittedRegressor, QuantilePredictions, Regressor};
use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Bayesian linear regression strategy
#[derive(Debug, Clone)]
pub struct BayesianLinear {
    prior_precision: f64,
    prior_shape: f64,
    prior_rate: f64,
}

impl Default for BayesianLinear {
    fn default() -> Self {
        // Coefficient prior sd of 100 in noise units
        Self {
            prior_precision: 1e-4,
            prior_shape: 1e-3,
            prior_rate: 1e-3,
        }
    }
}

impl BayesianLinear {
    /// Create a model with explicit prior hyper-parameters
    pub fn new(prior_precision: f64, prior_shape: f64, prior_rate: f64) -> Result<Self> {
        for (name, value) in [
            ("prior_precision", prior_precision),
            ("prior_shape", prior_shape),
            ("prior_rate", prior_rate),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ForecastError::InvalidParameter(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(Self {
            prior_precision,
            prior_shape,
            prior_rate,
        })
    }
}

/// Posterior of a [`BayesianLinear`] fit
#[derive(Debug, Clone)]
pub struct FittedBayesianLinear {
    /// Posterior mean, intercept first
    coefficients: Array1<f64>,
    /// Inverse posterior precision, in units of the noise variance
    covariance: Array2<f64>,
    shape: f64,
    rate: f64,
}

impl FittedBayesianLinear {
    /// Posterior mean of the intercept
    pub fn intercept(&self) -> f64 {
        self.coefficients[0]
    }

    /// Posterior mean of the feature coefficients
    pub fn coefficients(&self) -> ArrayView1<'_, f64> {
        self.coefficients.slice(ndarray::s![1..])
    }

    /// Degrees of freedom of the predictive Student-t
    pub fn degrees_of_freedom(&self) -> f64 {
        2.0 * self.shape
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() + 1 != self.coefficients.len() {
            return Err(ForecastError::ValidationError(format!(
                "Expected {} features, got {}",
                self.coefficients.len() - 1,
                x.ncols()
            )));
        }
        Ok(())
    }

    fn design_row(x: ArrayView1<'_, f64>) -> Array1<f64> {
        std::iter::once(1.0).chain(x.iter().copied()).collect()
    }
}

impl Regressor for BayesianLinear {
    type Fitted = FittedBayesianLinear;

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self::Fitted> {
        check_training_data(x, y)?;
        let n = x.nrows();
        let p = x.ncols() + 1;

        let mut design = Array2::<f64>::ones((n, p));
        design.slice_mut(ndarray::s![.., 1..]).assign(x);

        let mut precision = design.t().dot(&design);
        for i in 0..p {
            precision[[i, i]] += self.prior_precision;
        }
        let xty = design.t().dot(y);

        let factor = CholeskyFactor::new(&precision)?;
        let coefficients = factor.solve_vec(&xty);

        let explained = coefficients.dot(&xty);
        let residual = (y.dot(y) - explained).max(0.0);
        let shape = self.prior_shape + n as f64 / 2.0;
        let rate = self.prior_rate + 0.5 * residual;

        Ok(FittedBayesianLinear {
            coefficients,
            covariance: factor.inverse(),
            shape,
            rate,
        })
    }

    fn name(&self) -> &str {
        "BayesianLinear"
    }
}

impl FittedRegressor for FittedBayesianLinear {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_width(x)?;
        Ok(x
            .rows()
            .into_iter()
            .map(|row| Self::design_row(row).dot(&self.coefficients))
            .collect())
    }

    fn predict_proba(&self, x: &Array2<f64>, levels: &[f64]) -> Result<QuantilePredictions> {
        self.check_width(x)?;
        validate_levels(levels)?;

        let t = StudentsT::new(0.0, 1.0, self.degrees_of_freedom())
            .map_err(|e| ForecastError::ModelError(format!("Predictive distribution: {}", e)))?;
        let standard: Vec<f64> = levels.iter().map(|q| t.inverse_cdf(*q)).collect();
        let noise = self.rate / self.shape;

        let mut values = Array2::<f64>::zeros((x.nrows(), levels.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            let design = Self::design_row(row);
            let location = design.dot(&self.coefficients);
            let leverage = design.dot(&self.covariance.dot(&design));
            let scale = (noise * (1.0 + leverage)).sqrt();
            for (j, q) in standard.iter().enumerate() {
                values[[i, j]] = location + scale * q;
            }
        }

        QuantilePredictions::new(levels.to_vec(), values)
    }

    fn name(&self) -> &str {
        "BayesianLinear"
    }
}
