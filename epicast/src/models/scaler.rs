//! Feature standardisation

use super::{check_training_data, FittedRegressor, QuantilePredictions, Regressor};
use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2, Axis};

/// Per-column centring and scaling learnt on the training rows
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Learn column means and population standard deviations. Constant
    /// columns are only centred.
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(ForecastError::ModelError(
                "Cannot fit a scaler on zero rows".to_string(),
            ));
        }
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| ForecastError::ModelError("Empty feature matrix".to_string()))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 });
        Ok(Self { mean, scale })
    }

    /// Standardise rows of `x`
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(ForecastError::ValidationError(format!(
                "Expected {} features, got {}",
                self.mean.len(),
                x.ncols()
            )));
        }
        Ok((x - &self.mean) / &self.scale)
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }
}

/// Standardise features before handing them to the inner strategy
#[derive(Debug, Clone)]
pub struct Scaled<R> {
    inner: R,
    name: String,
}

impl<R: Regressor> Scaled<R> {
    pub fn new(inner: R) -> Self {
        let name = format!("Scaled{}", inner.name());
        Self { inner, name }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

/// Fitted [`Scaled`] strategy
#[derive(Debug)]
pub struct FittedScaled<F> {
    scaler: StandardScaler,
    inner: F,
    name: String,
}

impl<F> FittedScaled<F> {
    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }
}

impl<R: Regressor> Regressor for Scaled<R> {
    type Fitted = FittedScaled<R::Fitted>;

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self::Fitted> {
        check_training_data(x, y)?;
        let scaler = StandardScaler::fit(x)?;
        let inner = self.inner.fit(&scaler.transform(x)?, y)?;
        Ok(FittedScaled {
            scaler,
            inner,
            name: self.name.clone(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F: FittedRegressor> FittedRegressor for FittedScaled<F> {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner.predict(&self.scaler.transform(x)?)
    }

    fn predict_proba(&self, x: &Array2<f64>, levels: &[f64]) -> Result<QuantilePredictions> {
        self.inner.predict_proba(&self.scaler.transform(x)?, levels)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_scaler_standardises_columns() {
        let x = array![[1.0, 5.0], [3.0, 5.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        let z = scaler.transform(&x).unwrap();
        assert_relative_eq!(z[[0, 0]], -1.0);
        assert_relative_eq!(z[[1, 0]], 1.0);
        // Constant column is centred only
        assert_relative_eq!(z[[0, 1]], 0.0);
    }

    #[test]
    fn test_scaler_rejects_wrong_width() {
        let scaler = StandardScaler::fit(&array![[1.0, 2.0]]).unwrap();
        assert!(scaler.transform(&array![[1.0]]).is_err());
    }
}
