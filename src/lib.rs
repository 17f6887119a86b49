//! # Epicast workspace
//!
//! Facade over the workspace crates.
//!
//! - [`epicast`]: feature building, cleaning, forecasting and hub output
//! - [`series_math`]: missing-aware numeric kernels
//!
//! ## Example
//!
//! ```
//! use epicast_workspace::series_math::rolling_mean;
//!
//! let smoothed = rolling_mean(&[1.0, f64::NAN, 3.0], 2, 1).unwrap();
//! assert_eq!(smoothed, vec![1.0, 1.0, 3.0]);
//! ```

pub use epicast;
pub use series_math;
