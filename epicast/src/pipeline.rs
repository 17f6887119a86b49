//! Training table assembly and the per-universe, per-horizon forecast
//! pipeline
//!
//! Weeks are addressed relative to the end of the weekly grid. With
//! `instance_offset = k` the pipeline behaves as if the grid stopped `k`
//! weeks early, which is how historical forecast dates are backfilled.

use crate::error::{ForecastError, Result};
use crate::features::{lookup, FeatureId, FeatureSet};
use crate::hub::{ForecastRecord, ForecastType};
use crate::locations::{Locations, Universe};
use crate::models::{FittedRegressor, Regressor, HUB_QUANTILES};
use crate::panel::Matrix;
use crate::transforms::undo_normalize_case_value;
use crate::utils::{horizon_label, target_end_date};
use chrono::NaiveDate;
use log::{debug, info, warn};
use ndarray::{Array1, Array2};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Features outer-joined across all feature matrices, inner-joined with the
/// shifted target. One row per `(date, id)`, sorted.
#[derive(Debug, Clone)]
pub struct TrainingTable {
    keys: Vec<(NaiveDate, String)>,
    columns: Vec<FeatureId>,
    features: Array2<f64>,
    target: Vec<f64>,
}

impl TrainingTable {
    /// Join feature matrices with a target matrix. Rows whose target is a
    /// gap are kept; they are the prediction-time rows.
    pub fn build(features: &FeatureSet, target: &Matrix) -> Self {
        let target_ids = target.id_positions();

        let mut keys: BTreeSet<(NaiveDate, String)> = BTreeSet::new();
        for (_, matrix) in features.iter() {
            for date in matrix.dates() {
                if target.row_index(*date).is_none() {
                    continue;
                }
                for id in matrix.ids() {
                    if target_ids.contains_key(id.as_str()) {
                        keys.insert((*date, id.clone()));
                    }
                }
            }
        }
        let keys: Vec<(NaiveDate, String)> = keys.into_iter().collect();
        let columns: Vec<FeatureId> = features.iter().map(|(id, _)| *id).collect();

        let mut values = Array2::from_elem((keys.len(), columns.len()), f64::NAN);
        for (j, (_, matrix)) in features.iter().enumerate() {
            let positions = matrix.id_positions();
            for (i, (date, id)) in keys.iter().enumerate() {
                if let (Some(row), Some(col)) =
                    (matrix.row_index(*date), positions.get(id.as_str()))
                {
                    values[[i, j]] = matrix.values()[[row, *col]];
                }
            }
        }

        let target_values = keys
            .iter()
            .map(|(date, id)| {
                match (target.row_index(*date), target_ids.get(id.as_str())) {
                    (Some(row), Some(col)) => target.values()[[row, *col]],
                    _ => f64::NAN,
                }
            })
            .collect();

        Self {
            keys,
            columns,
            features: values,
            target: target_values,
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the join produced no rows
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// `(date, id)` of every row
    pub fn keys(&self) -> &[(NaiveDate, String)] {
        &self.keys
    }

    /// Feature column identifiers
    pub fn columns(&self) -> &[FeatureId] {
        &self.columns
    }

    /// Row positions of one date
    pub fn rows_for(&self, date: NaiveDate) -> std::ops::Range<usize> {
        let start = self.keys.partition_point(|(d, _)| *d < date);
        let end = self.keys.partition_point(|(d, _)| *d <= date);
        start..end
    }

    /// Target of a row
    pub fn target(&self, row: usize) -> f64 {
        self.target[row]
    }

    /// Value of a feature in a row
    pub fn feature(&self, row: usize, column: usize) -> f64 {
        self.features[[row, column]]
    }

    /// Position of a feature column
    pub fn column_index(&self, id: &FeatureId) -> Option<usize> {
        self.columns.iter().position(|c| c == id)
    }
}

/// Settings of one pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub universe: Universe,
    /// Forecast horizon in weeks
    pub weeks_ahead: usize,
    /// Training window in weeks
    pub train_window: usize,
    /// Ordered model inputs, by feature name
    pub feature_columns: Vec<String>,
}

/// Assembles the training table of one universe and horizon and drives a
/// model strategy through fit and predict.
#[derive(Debug)]
pub struct ForecastPipeline<R: Regressor> {
    config: PipelineConfig,
    feature_columns: Vec<usize>,
    /// Table columns the fitted model was trained on
    model_columns: Vec<usize>,
    dates: Vec<NaiveDate>,
    today: NaiveDate,
    table: TrainingTable,
    locations: Arc<Locations>,
    model: R,
    fitted: Option<R::Fitted>,
    quantile_levels: Vec<f64>,
}

impl<R: Regressor> ForecastPipeline<R> {
    /// Create a pipeline over cleaned features and the horizon's target.
    ///
    /// `dates` is the weekly grid and `target` must already be shifted by
    /// `config.weeks_ahead`.
    pub fn new(
        config: PipelineConfig,
        features: &FeatureSet,
        target: &Matrix,
        dates: Vec<NaiveDate>,
        today: NaiveDate,
        locations: Arc<Locations>,
        model: R,
    ) -> Result<Self> {
        if config.weeks_ahead == 0 {
            return Err(ForecastError::InvalidParameter(
                "weeks_ahead must be at least 1".to_string(),
            ));
        }
        if config.train_window == 0 {
            return Err(ForecastError::InvalidParameter(
                "train_window must be at least 1".to_string(),
            ));
        }
        if config.feature_columns.is_empty() {
            return Err(ForecastError::InvalidParameter(format!(
                "No feature columns configured for the {} universe",
                config.universe
            )));
        }

        let table = TrainingTable::build(features, target);
        let feature_columns = config
            .feature_columns
            .iter()
            .map(|name| {
                let id = lookup(config.universe, name)?;
                table.column_index(&id).ok_or_else(|| {
                    ForecastError::UnknownFeature(format!("{} has not been built", name))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "{} {} wk table: {} rows x {} features",
            config.universe,
            config.weeks_ahead,
            table.len(),
            feature_columns.len()
        );

        Ok(Self {
            config,
            model_columns: feature_columns.clone(),
            feature_columns,
            dates,
            today,
            table,
            locations,
            model,
            fitted: None,
            quantile_levels: HUB_QUANTILES.to_vec(),
        })
    }

    /// Use other quantile levels for [`Self::predict_proba`]
    pub fn with_quantiles(mut self, levels: Vec<f64>) -> Result<Self> {
        crate::models::validate_levels(&levels)?;
        self.quantile_levels = levels;
        Ok(self)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn table(&self) -> &TrainingTable {
        &self.table
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Fitted model, once [`Self::fit`] has succeeded
    pub fn fitted(&self) -> Option<&R::Fitted> {
        self.fitted.as_ref()
    }

    /// Features the model is trained on. Configured columns with no
    /// observation in the training window are left out by [`Self::fit`].
    pub fn model_features(&self) -> Vec<FeatureId> {
        self.model_columns
            .iter()
            .map(|col| self.table.columns()[*col])
            .collect()
    }

    /// Exclusive end of the grid as seen from `instance_offset`
    fn grid_end(&self, instance_offset: usize) -> Result<usize> {
        match self.dates.len().checked_sub(instance_offset) {
            Some(end) if end > 0 => Ok(end),
            _ => Err(ForecastError::InvalidParameter(format!(
                "Instance offset {} is beyond the {} week grid",
                instance_offset,
                self.dates.len()
            ))),
        }
    }

    /// Date whose features are used for prediction
    pub fn instance_date(&self, instance_offset: usize) -> Result<NaiveDate> {
        let end = self.grid_end(instance_offset)?;
        Ok(self.dates[end - 1])
    }

    /// Training dates: `train_window` weeks ending `weeks_ahead` weeks before
    /// the instance grid end, so no label lies beyond the instance date.
    pub fn train_dates(&self, instance_offset: usize) -> Result<&[NaiveDate]> {
        let end = self.grid_end(instance_offset)?;
        let h = self.config.weeks_ahead;
        let window = self.config.train_window;
        if end < window + h {
            return Err(ForecastError::UntrainableWindow(format!(
                "{} weeks of training plus a {} week horizon need {} weeks, only {} available",
                window,
                h,
                window + h,
                end
            )));
        }
        Ok(&self.dates[end - window - h..end - h])
    }

    fn feature_row(&self, row: usize, columns: &[usize]) -> Vec<f64> {
        columns
            .iter()
            .map(|col| self.table.feature(row, *col))
            .collect()
    }

    /// Fit the model strategy on the training window
    pub fn fit(&mut self, instance_offset: usize) -> Result<()> {
        let train_dates = self.train_dates(instance_offset)?.to_vec();
        if let (Some(first), Some(last)) = (train_dates.first(), train_dates.last()) {
            info!(
                "Training {} {} wk ahead on window [{}, {}]",
                self.config.universe, self.config.weeks_ahead, first, last
            );
        }

        let mut window_rows = Vec::new();
        for date in &train_dates {
            let rows = self.table.rows_for(*date);
            if !rows.clone().any(|r| self.table.target(r).is_finite()) {
                return Err(ForecastError::UntrainableWindow(format!(
                    "No target observed for {}",
                    date
                )));
            }
            window_rows.extend(rows);
        }

        // Metrics without a source stay gaps after cleaning
        let mut columns = Vec::with_capacity(self.feature_columns.len());
        for (name, col) in self.config.feature_columns.iter().zip(&self.feature_columns) {
            if window_rows
                .iter()
                .any(|row| self.table.feature(*row, *col).is_finite())
            {
                columns.push(*col);
            } else {
                warn!(
                    "{} is unobserved in the {} {} wk training window, leaving it out",
                    name, self.config.universe, self.config.weeks_ahead
                );
            }
        }
        if columns.is_empty() {
            return Err(ForecastError::UntrainableWindow(format!(
                "No configured feature is observed in the {} {} wk training window",
                self.config.universe, self.config.weeks_ahead
            )));
        }

        let mut x_rows: Vec<f64> = Vec::new();
        let mut y: Vec<f64> = Vec::new();
        let mut dropped = 0usize;
        for row in window_rows {
            let features = self.feature_row(row, &columns);
            let target = self.table.target(row);
            if !target.is_finite() || features.iter().any(|v| !v.is_finite()) {
                dropped += 1;
                continue;
            }
            x_rows.extend(features);
            y.push(target);
        }
        if dropped > 0 {
            warn!(
                "Dropped {} incomplete rows from the {} {} wk training window",
                dropped, self.config.universe, self.config.weeks_ahead
            );
        }
        if y.is_empty() {
            return Err(ForecastError::UntrainableWindow(
                "Every row of the training window is incomplete".to_string(),
            ));
        }

        let x = Array2::from_shape_vec((y.len(), columns.len()), x_rows)
            .map_err(|e| ForecastError::ModelError(e.to_string()))?;
        self.fitted = Some(self.model.fit(&x, &Array1::from(y))?);
        self.model_columns = columns;
        Ok(())
    }

    /// Complete feature rows of the instance date
    fn instance(&self, instance_offset: usize) -> Result<(NaiveDate, Vec<String>, Array2<f64>)> {
        let date = self.instance_date(instance_offset)?;
        info!("Predicting on {}", date);

        let mut ids = Vec::new();
        let mut values = Vec::new();
        let mut dropped = 0usize;
        for row in self.table.rows_for(date) {
            let features = self.feature_row(row, &self.model_columns);
            if features.iter().any(|v| !v.is_finite()) {
                dropped += 1;
                continue;
            }
            ids.push(self.table.keys()[row].1.clone());
            values.extend(features);
        }
        if dropped > 0 {
            warn!("Skipping {} entities with incomplete features on {}", dropped, date);
        }
        let x = Array2::from_shape_vec((ids.len(), self.model_columns.len()), values)
            .map_err(|e| ForecastError::ModelError(e.to_string()))?;
        Ok((date, ids, x))
    }

    fn fitted_model(&self) -> Result<&R::Fitted> {
        self.fitted.as_ref().ok_or_else(|| {
            ForecastError::NotFitted(format!(
                "{} {} wk ahead pipeline",
                self.config.universe, self.config.weeks_ahead
            ))
        })
    }

    fn record(
        &self,
        instance: NaiveDate,
        id: &str,
        kind: ForecastType,
        quantile: Option<f64>,
        value: f64,
        should_undo_normalize_cases: bool,
    ) -> ForecastRecord {
        let value = if should_undo_normalize_cases {
            undo_normalize_case_value(value, id, &self.locations)
        } else {
            value
        };
        ForecastRecord {
            forecast_date: self.today,
            target: horizon_label(self.config.weeks_ahead),
            target_end_date: target_end_date(instance, self.config.weeks_ahead),
            id: id.to_string(),
            kind,
            quantile,
            value,
        }
    }

    /// Point forecast per entity at the instance date
    pub fn predict(
        &self,
        instance_offset: usize,
        should_undo_normalize_cases: bool,
    ) -> Result<Vec<ForecastRecord>> {
        let fitted = self.fitted_model()?;
        let (date, ids, x) = self.instance(instance_offset)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let predictions = fitted.predict(&x)?;

        let mut records = Vec::with_capacity(ids.len());
        for (id, value) in ids.iter().zip(predictions.iter()) {
            if !value.is_finite() {
                warn!("Non-finite prediction for {} on {}", id, date);
                continue;
            }
            let record = self.record(
                date,
                id,
                ForecastType::Point,
                None,
                *value,
                should_undo_normalize_cases,
            );
            if record.value.is_finite() {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Quantile forecasts, one record per entity and level
    pub fn predict_proba(
        &self,
        instance_offset: usize,
        should_undo_normalize_cases: bool,
    ) -> Result<Vec<ForecastRecord>> {
        let fitted = self.fitted_model()?;
        let (date, ids, x) = self.instance(instance_offset)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let quantiles = fitted.predict_proba(&x, &self.quantile_levels)?;

        let mut records = Vec::with_capacity(ids.len() * self.quantile_levels.len());
        for (i, id) in ids.iter().enumerate() {
            for (level, value) in quantiles.row(i) {
                if !value.is_finite() {
                    warn!("Non-finite {} quantile for {} on {}", level, id, date);
                    continue;
                }
                let record = self.record(
                    date,
                    id,
                    ForecastType::Quantile,
                    Some(level),
                    value,
                    should_undo_normalize_cases,
                );
                if record.value.is_finite() {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }
}
