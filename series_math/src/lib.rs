//! # Series Math
//!
//! Missing-aware numeric kernels for daily and weekly surveillance series.
//! Every function works on plain `f64` slices where `NaN` marks an
//! unobserved value; an observed value is never replaced by zero unless the
//! caller asks for it.

use thiserror::Error;

pub mod fill;
pub mod rolling;
pub mod stats;

pub use fill::{fill_missing, forward_fill};
pub use rolling::{diff, rolling_mean, shift, RollingMean};
pub use stats::{clip_lower, nan_count, nan_mean, nan_std, nan_sum, winsor_bounds};

/// Errors that can occur in series calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },
}

/// Result type for series math operations
pub type Result<T> = std::result::Result<T, MathError>;

/// Returns true when the value is an observation rather than a gap.
#[inline]
pub fn is_observed(value: f64) -> bool {
    !value.is_nan()
}
