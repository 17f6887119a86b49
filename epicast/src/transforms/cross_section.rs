//! Statistics across entities within one date
//!
//! Every function here works row by row: the values of a date never leak
//! into another date.

use crate::locations::Locations;
use crate::panel::Matrix;
use ndarray::{Array2, Axis};
use series_math::{nan_mean, nan_sum, winsor_bounds};
use std::collections::HashMap;

/// How child entities combine into their parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    /// Counts: sum of observed children, zero when none is observed
    Sum,
    /// Rates and proportions: mean of observed children
    Mean,
}

impl Aggregate {
    fn apply(&self, values: &[f64]) -> f64 {
        match self {
            Aggregate::Sum => nan_sum(values),
            Aggregate::Mean => nan_mean(values),
        }
    }
}

/// Mean across entities, broadcast back to every entity of the date
pub fn cross_section_mean(matrix: &Matrix) -> Matrix {
    matrix.map_rows(|row| vec![nan_mean(row); row.len()])
}

/// Clip every value of a date into `mean ± threshold · std` of that date.
/// Dates where the spread is undefined are left untouched.
pub fn cross_section_winsor(matrix: &Matrix, threshold: f64) -> Matrix {
    matrix.map_rows(|row| match winsor_bounds(row, threshold) {
        Some((lower, upper)) => row
            .iter()
            .map(|v| if v.is_nan() { *v } else { v.clamp(lower, upper) })
            .collect(),
        None => row.to_vec(),
    })
}

/// Mean within groups, broadcast to group members. Entities with no group
/// get a gap.
fn group_mean<G>(matrix: &Matrix, group_of: G) -> Matrix
where
    G: Fn(&str) -> Option<String>,
{
    let mut group_index: HashMap<String, usize> = HashMap::new();
    let groups: Vec<Option<usize>> = matrix
        .ids()
        .iter()
        .map(|id| {
            group_of(id).map(|g| {
                let next = group_index.len();
                *group_index.entry(g).or_insert(next)
            })
        })
        .collect();
    let n_groups = group_index.len();

    matrix.map_rows(|row| {
        let mut sums = vec![0.0; n_groups];
        let mut counts = vec![0usize; n_groups];
        for (v, g) in row.iter().zip(&groups) {
            if let Some(g) = g {
                if !v.is_nan() {
                    sums[*g] += v;
                    counts[*g] += 1;
                }
            }
        }
        groups
            .iter()
            .map(|g| match g {
                Some(g) if counts[*g] > 0 => sums[*g] / counts[*g] as f64,
                _ => f64::NAN,
            })
            .collect()
    })
}

/// Mean within each county's CBSA
pub fn cross_section_cbsa_mean(matrix: &Matrix, locations: &Locations) -> Matrix {
    group_mean(matrix, |id| locations.cbsa_of(id).map(str::to_string))
}

/// Mean within each county's state
pub fn cross_section_state_mean(matrix: &Matrix, locations: &Locations) -> Matrix {
    group_mean(matrix, |id| locations.state_of(id).map(str::to_string))
}

/// Each county takes its parent state's value from `states`, aligned by date
pub fn get_state_value(matrix: &Matrix, states: &Matrix, locations: &Locations) -> Matrix {
    let state_columns = states.id_positions();
    let source_rows: Vec<Option<usize>> = matrix
        .dates()
        .iter()
        .map(|d| states.row_index(*d))
        .collect();

    let mut values = Array2::from_elem((matrix.nrows(), matrix.ncols()), f64::NAN);
    for (j, id) in matrix.ids().iter().enumerate() {
        let Some(&src) = locations
            .state_of(id)
            .and_then(|state| state_columns.get(state))
        else {
            continue;
        };
        for (i, row) in source_rows.iter().enumerate() {
            if let Some(row) = row {
                values[[i, j]] = states.values()[[*row, src]];
            }
        }
    }
    matrix.with_values(values)
}

/// Every entity takes the national value of the date. A national matrix
/// without columns yields all gaps.
pub fn get_national_value(matrix: &Matrix, national: &Matrix) -> Matrix {
    let mut values = Array2::from_elem((matrix.nrows(), matrix.ncols()), f64::NAN);
    if national.ncols() > 0 {
        for (i, date) in matrix.dates().iter().enumerate() {
            if let Some(src) = national.row_index(*date) {
                values
                    .index_axis_mut(Axis(0), i)
                    .fill(national.values()[[src, 0]]);
            }
        }
    }
    matrix.with_values(values)
}

/// Collapse children into one column named `parent_id`
pub fn aggregate_children(children: &Matrix, parent_id: &str, aggregate: Aggregate) -> Matrix {
    let mut values = Array2::from_elem((children.nrows(), 1), f64::NAN);
    for (i, row) in children.values().axis_iter(Axis(0)).enumerate() {
        values[[i, 0]] = aggregate.apply(&row.to_vec());
    }
    Matrix::from_parts(children.dates().to_vec(), vec![parent_id.to_string()], values)
}
