//! Dense solves on ndarray matrices through faer

use crate::error::{ForecastError, Result};
use faer::linalg::solvers::{Llt, Solve};
use faer::{Mat, MatRef, Side};
use ndarray::{Array1, Array2};

fn to_faer(array: &Array2<f64>) -> Mat<f64> {
    Mat::from_fn(array.nrows(), array.ncols(), |i, j| array[[i, j]])
}

fn to_array(mat: MatRef<'_, f64>) -> Array2<f64> {
    Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}

/// Cholesky factorisation `a = L Lᵀ` of a symmetric positive definite matrix
pub struct CholeskyFactor {
    factor: Llt<f64>,
    dim: usize,
}

impl CholeskyFactor {
    /// Factorise `a`, failing when it is not positive definite
    pub fn new(a: &Array2<f64>) -> Result<Self> {
        if a.nrows() != a.ncols() {
            return Err(ForecastError::ValidationError(format!(
                "Cholesky needs a square matrix, got {}x{}",
                a.nrows(),
                a.ncols()
            )));
        }
        let factor = to_faer(a).as_ref().llt(Side::Lower).map_err(|e| {
            ForecastError::ModelError(format!("Cholesky factorization failed: {:?}", e))
        })?;
        Ok(Self {
            factor,
            dim: a.nrows(),
        })
    }

    /// Solve `a x = rhs`
    pub fn solve_vec(&self, rhs: &Array1<f64>) -> Array1<f64> {
        let rhs = Mat::from_fn(rhs.len(), 1, |i, _| rhs[i]);
        let sol = self.factor.solve(rhs.as_ref());
        Array1::from_shape_fn(sol.nrows(), |i| sol[(i, 0)])
    }

    /// `a⁻¹`
    pub fn inverse(&self) -> Array2<f64> {
        let identity = Mat::from_fn(self.dim, self.dim, |i, j| if i == j { 1.0 } else { 0.0 });
        let sol = self.factor.solve(identity.as_ref());
        to_array(sol.as_ref())
    }
}
