//! Run context and orchestration across universes and horizons

use crate::config::Config;
use crate::data::{Metric, RawData};
use crate::error::{ForecastError, Result};
use crate::features::{build_features, clean_features, DailyMatrices, FeatureSet};
use crate::hub::{
    hub_file_name, pivot_forecasts, relabel_to_hub_codes, write_matrix_csv, ForecastRecord,
    HubTable,
};
use crate::locations::{Locations, Universe};
use crate::models::{validate_levels, Regressor, HUB_QUANTILES};
use crate::panel::{Matrix, Panel};
use crate::pipeline::{ForecastPipeline, PipelineConfig};
use crate::target::{build_target, incidence_history};
use crate::utils::weekly_grid;
use chrono::NaiveDate;
use log::info;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Immutable context of one forecast run
#[derive(Debug, Clone)]
pub struct Environment {
    today: NaiveDate,
    locations: Arc<Locations>,
    config: Config,
}

impl Environment {
    /// Create a context; the grid runs from `config.start_date` to `today`
    pub fn new(today: NaiveDate, locations: Locations, config: Config) -> Result<Self> {
        config.validate()?;
        if config.start_date > today {
            return Err(ForecastError::InvalidParameter(format!(
                "start_date {} is after today {}",
                config.start_date, today
            )));
        }
        Ok(Self {
            today,
            locations: Arc::new(locations),
            config,
        })
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn start_date(&self) -> NaiveDate {
        self.config.start_date
    }

    pub fn locations(&self) -> &Locations {
        &self.locations
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Weekly date grid of the run
    pub fn weekly_dates(&self) -> Result<Vec<NaiveDate>> {
        weekly_grid(self.config.start_date, self.today)
    }
}

/// Mutable caches of one run: raw data, cleaned features per universe and
/// fitted pipelines per universe and horizon. Each cache is populated once.
#[derive(Debug)]
pub struct ForecastRun<'a, R: Regressor> {
    env: &'a Environment,
    data: RawData,
    model: R,
    quantile_levels: Vec<f64>,
    features: BTreeMap<Universe, FeatureSet>,
    models: BTreeMap<(Universe, usize), ForecastPipeline<R>>,
}

impl<'a, R: Regressor> ForecastRun<'a, R> {
    /// Start a run over loaded raw data with a model strategy
    pub fn new(env: &'a Environment, data: RawData, model: R) -> Self {
        Self {
            env,
            data,
            model,
            quantile_levels: HUB_QUANTILES.to_vec(),
            features: BTreeMap::new(),
            models: BTreeMap::new(),
        }
    }

    /// Request other quantile levels than the hub's
    pub fn with_quantiles(mut self, levels: Vec<f64>) -> Result<Self> {
        validate_levels(&levels)?;
        self.quantile_levels = levels;
        Ok(self)
    }

    pub fn data(&self) -> &RawData {
        &self.data
    }

    /// Cleaned features of a universe, once built
    pub fn features(&self, universe: Universe) -> Option<&FeatureSet> {
        self.features.get(&universe)
    }

    /// Fitted pipeline of a universe and horizon
    pub fn model(&self, universe: Universe, weeks_ahead: usize) -> Option<&ForecastPipeline<R>> {
        self.models.get(&(universe, weeks_ahead))
    }

    fn cumulative_cases(&self) -> Result<&Panel> {
        self.data.get(Metric::JhuConfirmedCases).ok_or_else(|| {
            ForecastError::DataError(format!("{} has not been loaded", Metric::JhuConfirmedCases))
        })
    }

    /// Build and clean the features of every universe with members
    pub fn build_features(&mut self) -> Result<()> {
        let env = self.env;
        let daily = DailyMatrices::from_raw(&self.data, env.start_date(), env.today())?;
        let weekly = env.weekly_dates()?;
        for universe in Universe::ALL {
            if env.locations().universe(universe).is_empty() {
                info!("No {} locations, skipping its features", universe);
                continue;
            }
            let built = build_features(universe, &daily, &weekly)?;
            let cleaned = clean_features(universe, &built, env.locations())?;
            self.features.insert(universe, cleaned);
        }
        Ok(())
    }

    /// Fit one pipeline per universe and horizon as of `instance_offset`
    /// weeks before the end of the grid. Builds features first if needed.
    pub fn train_models(&mut self, instance_offset: usize) -> Result<()> {
        if self.features.is_empty() {
            self.build_features()?;
        }
        let env = self.env;
        let weekly = env.weekly_dates()?;
        let targets = env
            .config()
            .horizons()
            .map(|weeks_ahead| {
                build_target(
                    self.cumulative_cases()?,
                    env.start_date(),
                    env.today(),
                    weeks_ahead,
                    env.locations(),
                )
            })
            .collect::<Result<Vec<Matrix>>>()?;

        for universe in Universe::ALL {
            let Some(features) = self.features.get(&universe) else {
                continue;
            };
            let settings = env.config().universe(universe);
            for (weeks_ahead, target) in env.config().horizons().zip(&targets) {
                info!("Training {} {} wk ahead", universe, weeks_ahead);
                let config = PipelineConfig {
                    universe,
                    weeks_ahead,
                    train_window: settings.train_window,
                    feature_columns: settings.feature_columns.clone(),
                };
                let mut pipeline = ForecastPipeline::new(
                    config,
                    features,
                    target,
                    weekly.clone(),
                    env.today(),
                    Arc::clone(&env.locations),
                    self.model.clone(),
                )?
                .with_quantiles(self.quantile_levels.clone())?;
                pipeline.fit(instance_offset)?;
                self.models.insert((universe, weeks_ahead), pipeline);
            }
        }
        Ok(())
    }

    fn predict_universe(
        &self,
        universe: Universe,
        should_predict_proba: bool,
        should_undo_normalize_cases: bool,
        instance_offset: usize,
    ) -> Result<Vec<ForecastRecord>> {
        let mut records = Vec::new();
        for ((_, _), pipeline) in self.models.range((universe, 0)..=(universe, usize::MAX)) {
            let batch = if should_predict_proba {
                pipeline.predict_proba(instance_offset, should_undo_normalize_cases)?
            } else {
                pipeline.predict(instance_offset, should_undo_normalize_cases)?
            };
            records.extend(batch);
        }
        Ok(records)
    }

    /// Predictions of every fitted pipeline
    pub fn predict(
        &self,
        should_predict_proba: bool,
        should_undo_normalize_cases: bool,
        instance_offset: usize,
    ) -> Result<Vec<ForecastRecord>> {
        if self.models.is_empty() {
            return Err(ForecastError::NotFitted(
                "train_models has not been run".to_string(),
            ));
        }
        let mut records = Vec::new();
        for universe in Universe::ALL {
            records.extend(self.predict_universe(
                universe,
                should_predict_proba,
                should_undo_normalize_cases,
                instance_offset,
            )?);
        }
        Ok(records)
    }

    /// Hub submission of point forecasts, plus quantiles when requested, in
    /// raw case counts
    pub fn hub_table(&self, instance_offset: usize, include_quantiles: bool) -> Result<HubTable> {
        let mut records = self.predict(false, true, instance_offset)?;
        if include_quantiles {
            records.extend(self.predict(true, true, instance_offset)?);
        }
        Ok(HubTable::from_records(&records, self.env.locations()))
    }

    /// Write the hub submission into `dir`, returning the file path
    pub fn write_hub_csv<P: AsRef<Path>>(
        &self,
        dir: P,
        instance_offset: usize,
        include_quantiles: bool,
    ) -> Result<PathBuf> {
        let table = self.hub_table(instance_offset, include_quantiles)?;
        fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(hub_file_name(
            self.env.today(),
            &self.env.config().model_name,
            instance_offset,
        ));
        table.write_csv(&path)?;
        Ok(path)
    }

    /// Weekly new cases per 100k of every location
    pub fn new_cases_per_100k(&self) -> Result<Matrix> {
        incidence_history(
            self.cumulative_cases()?,
            self.env.start_date(),
            self.env.today(),
            self.env.locations(),
        )
    }

    /// Write, per universe, the normalized point forecasts and the weekly
    /// incidence history as wide CSV files keyed by hub location code
    pub fn write_visualization<P: AsRef<Path>>(
        &self,
        dir: P,
        instance_offset: usize,
    ) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let history = self.new_cases_per_100k()?;

        let mut written = Vec::new();
        for universe in Universe::ALL {
            let ids = self.env.locations().universe(universe);
            if ids.is_empty() {
                continue;
            }
            let records = self.predict_universe(universe, false, false, instance_offset)?;
            let forecasts = pivot_forecasts(&records, self.env.locations());
            let path = dir.join(format!("IncidentCasesForecast_{}.csv", universe.title()));
            write_matrix_csv(&forecasts, &path)?;
            written.push(path);

            let observed = relabel_to_hub_codes(&history, ids, self.env.locations())?;
            let path = dir.join(format!("IncidentCases_{}.csv", universe.title()));
            write_matrix_csv(&observed, &path)?;
            written.push(path);
        }
        Ok(written)
    }
}
