//! Run configuration, read from and written to TOML

use crate::error::{ForecastError, Result};
use crate::features::{catalog, lookup};
use crate::locations::Universe;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

/// Settings of one universe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseConfig {
    /// Weeks of training rows
    pub train_window: usize,
    /// Ordered model inputs
    pub feature_columns: Vec<String>,
}

impl UniverseConfig {
    /// Default window and the universe's full enumerated feature list
    pub fn default_for(universe: Universe) -> Self {
        let train_window = match universe {
            Universe::National => 16,
            Universe::State => 20,
            Universe::County => 24,
        };
        Self {
            train_window,
            feature_columns: catalog(universe)
                .into_iter()
                .map(|spec| spec.id.to_string())
                .collect(),
        }
    }
}

/// Configuration of a forecast run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// First day of the daily grid
    pub start_date: NaiveDate,
    /// Horizons run from 1 to this many weeks
    pub max_weeks_ahead: usize,
    /// Team-model label of the hub file name
    pub model_name: String,
    pub national: UniverseConfig,
    pub state: UniverseConfig,
    pub county: UniverseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2020, 1, 20).unwrap_or_default(),
            max_weeks_ahead: 4,
            model_name: "Epicast-BayesianLinear".to_string(),
            national: UniverseConfig::default_for(Universe::National),
            state: UniverseConfig::default_for(Universe::State),
            county: UniverseConfig::default_for(Universe::County),
        }
    }
}

impl Config {
    /// Parse and validate a TOML document. Omitted keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Settings of a universe
    pub fn universe(&self, universe: Universe) -> &UniverseConfig {
        match universe {
            Universe::National => &self.national,
            Universe::State => &self.state,
            Universe::County => &self.county,
        }
    }

    /// Forecast horizons in weeks
    pub fn horizons(&self) -> RangeInclusive<usize> {
        1..=self.max_weeks_ahead
    }

    /// Check windows, horizons and that every feature column is enumerated
    /// for its universe
    pub fn validate(&self) -> Result<()> {
        if self.max_weeks_ahead == 0 {
            return Err(ForecastError::ConfigError(
                "max_weeks_ahead must be at least 1".to_string(),
            ));
        }
        if self.model_name.trim().is_empty() {
            return Err(ForecastError::ConfigError("model_name is empty".to_string()));
        }
        for universe in Universe::ALL {
            let settings = self.universe(universe);
            if settings.train_window == 0 {
                return Err(ForecastError::ConfigError(format!(
                    "{}.train_window must be at least 1",
                    universe
                )));
            }
            if settings.feature_columns.is_empty() {
                return Err(ForecastError::ConfigError(format!(
                    "{}.feature_columns is empty",
                    universe
                )));
            }
            for name in &settings.feature_columns {
                lookup(universe, name).map_err(|_| {
                    ForecastError::ConfigError(format!(
                        "{} is not a {} feature",
                        name, universe
                    ))
                })?;
            }
        }
        Ok(())
    }
}
