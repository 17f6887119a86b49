//! # Epicast
//!
//! Weekly incident case forecasting at national, state and county
//! resolution, written out in the forecast hub format.
//!
//! ## Features
//!
//! - Long panel and wide matrix containers with explicit conversions
//! - Per-universe feature catalogues with typed feature identifiers
//! - Deterministic imputation plans (parent geography, CBSA, cross-section)
//! - Horizon-shifted targets in new cases per 100k residents
//! - Pluggable model strategies with point and quantile predictions
//! - Hub CSV and visualization exports
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use epicast::config::Config;
//! use epicast::data::DataLoader;
//! use epicast::env::{Environment, ForecastRun};
//! use epicast::locations::Locations;
//! use epicast::models::{BayesianLinear, Scaled};
//! use epicast::utils::parse_date;
//!
//! # fn main() -> epicast::Result<()> {
//! let locations = Locations::from_csv("locations.csv")?;
//! let env = Environment::new(parse_date("2020-06-01")?, locations, Config::default())?;
//!
//! let data = DataLoader::from_dir("data")?;
//! let mut run = ForecastRun::new(&env, data, Scaled::new(BayesianLinear::default()));
//! run.build_features()?;
//! run.train_models(0)?;
//! run.write_hub_csv("output", 0, true)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod env;
pub mod error;
pub mod features;
pub mod hub;
pub mod locations;
pub mod models;
pub mod panel;
pub mod pipeline;
pub mod target;
pub mod transforms;
pub mod utils;

// Re-export commonly used types
pub use crate::config::{Config, UniverseConfig};
pub use crate::data::{DataLoader, Metric, RawData};
pub use crate::env::{Environment, ForecastRun};
pub use crate::error::{ForecastError, Result};
pub use crate::features::{FeatureId, FeatureSet};
pub use crate::hub::{ForecastRecord, ForecastType, HubTable};
pub use crate::locations::{Location, Locations, Universe};
pub use crate::models::{FittedRegressor, QuantilePredictions, Regressor};
pub use crate::panel::{to_matrix, to_panel, Matrix, Panel};
pub use crate::pipeline::{ForecastPipeline, PipelineConfig, TrainingTable};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
