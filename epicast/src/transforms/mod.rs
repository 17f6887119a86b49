//! Matrix transforms shared by the feature cleaners and the target builder
//!
//! All functions take a [`Matrix`] and return a new one; inputs are never
//! mutated.

pub mod cross_section;
pub mod normalize;

pub use cross_section::{
    aggregate_children, cross_section_cbsa_mean, cross_section_mean, cross_section_state_mean,
    cross_section_winsor, get_national_value, get_state_value, Aggregate,
};
pub use normalize::{
    normalize_beds, normalize_cases, undo_normalize_beds, undo_normalize_case_value,
    undo_normalize_cases,
};

use crate::panel::Matrix;
use std::collections::HashSet;

/// Restrict a matrix to a universe.
///
/// Without `fill_missing` the result holds the matrix columns that belong to
/// the universe, in the matrix's own order. With `fill_missing` it holds
/// exactly `universe`, in that order, with gap columns for absent ids.
pub fn select_universe(matrix: &Matrix, universe: &[String], fill_missing: bool) -> Matrix {
    if fill_missing {
        return matrix.with_columns(universe);
    }
    let members: HashSet<&str> = universe.iter().map(String::as_str).collect();
    let present: Vec<String> = matrix
        .ids()
        .iter()
        .filter(|id| members.contains(id.as_str()))
        .cloned()
        .collect();
    matrix.with_columns(&present)
}
