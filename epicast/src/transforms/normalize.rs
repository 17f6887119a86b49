//! Per-capita and per-bed scaling

use crate::locations::Locations;
use crate::panel::Matrix;
use ndarray::Axis;

/// Cases are reported per this many residents
pub const PER_CAPITA_SCALE: f64 = 1e5;

fn usable(denominator: Option<f64>) -> Option<f64> {
    denominator.filter(|d| d.is_finite() && *d > 0.0)
}

/// Apply `f(value, denominator)` down every column. Columns without a usable
/// denominator become gap columns.
fn scale_columns<D, F>(matrix: &Matrix, denominator: D, f: F) -> Matrix
where
    D: Fn(&str) -> Option<f64>,
    F: Fn(f64, f64) -> f64,
{
    let mut values = matrix.values().clone();
    for (id, mut column) in matrix.ids().iter().zip(values.axis_iter_mut(Axis(1))) {
        match usable(denominator(id)) {
            Some(d) => column.mapv_inplace(|v| f(v, d)),
            None => column.fill(f64::NAN),
        }
    }
    matrix.with_values(values)
}

/// Cases per 100k residents
pub fn normalize_cases(matrix: &Matrix, locations: &Locations) -> Matrix {
    scale_columns(
        matrix,
        |id| locations.population(id),
        |v, population| v / population * PER_CAPITA_SCALE,
    )
}

/// Counts per licensed hospital bed
pub fn normalize_beds(matrix: &Matrix, locations: &Locations) -> Matrix {
    scale_columns(
        matrix,
        |id| locations.beds(id),
        |v, beds| v / beds,
    )
}

/// Inverse of [`normalize_cases`]
pub fn undo_normalize_cases(matrix: &Matrix, locations: &Locations) -> Matrix {
    scale_columns(
        matrix,
        |id| locations.population(id),
        |v, population| v / PER_CAPITA_SCALE * population,
    )
}

/// Inverse of [`normalize_beds`]
pub fn undo_normalize_beds(matrix: &Matrix, locations: &Locations) -> Matrix {
    scale_columns(matrix, |id| locations.beds(id), |v, beds| v * beds)
}

/// Inverse of [`normalize_cases`] for a single value of `id`
pub fn undo_normalize_case_value(value: f64, id: &str, locations: &Locations) -> f64 {
    match usable(locations.population(id)) {
        Some(population) => value / PER_CAPITA_SCALE * population,
        None => f64::NAN,
    }
}
