//! Feature identifiers, per-universe catalogues, building and cleaning
//!
//! Every universe enumerates its own features explicitly in [`national`],
//! [`state`] and [`county`]. Each entry pairs a [`FeatureId`] with the impute
//! group whose [`CleanStep`] plan fills its gaps.
//!
//! Building runs on the daily grid (rolling windows and lags are in days) and
//! only then reindexes onto the weekly grid.

pub mod clean;
pub mod county;
pub mod national;
pub mod state;

pub use clean::{apply_plan, CleanStep};

use crate::data::{Metric, RawData};
use crate::error::{ForecastError, Result};
use crate::locations::{Locations, Universe};
use crate::panel::{to_matrix, Matrix};
use crate::utils::daily_grid;
use chrono::NaiveDate;
use log::{debug, info};
use ndarray::Array2;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Default rolling window, in days
pub const WEEK: usize = 7;

/// Transform applied to the daily raw series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Transform {
    /// The raw value itself
    Level,
    /// Difference with the value `n` days earlier
    Diff(usize),
    /// Trailing mean over `window` days
    RollingMean { window: usize, min_periods: usize },
}

/// Which entity a feature value is taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// The entity's own series
    Own,
    /// The parent state's series, broadcast to its counties
    State,
    /// The CBSA average of the entity's series
    Cbsa,
}

/// Typed feature name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId {
    pub metric: Metric,
    pub transform: Transform,
    /// Lag in days applied after the transform
    pub shift: usize,
    pub scope: Scope,
}

impl FeatureId {
    /// Raw level of a metric
    pub const fn level(metric: Metric) -> Self {
        Self {
            metric,
            transform: Transform::Level,
            shift: 0,
            scope: Scope::Own,
        }
    }

    /// `lag`-day difference of a metric
    pub const fn diff(metric: Metric, lag: usize) -> Self {
        Self {
            metric,
            transform: Transform::Diff(lag),
            shift: 0,
            scope: Scope::Own,
        }
    }

    /// Weekly rolling mean of a metric. Sparse signals accept a single
    /// observation per window, everything else needs a full week.
    pub fn rolling(metric: Metric) -> Self {
        let min_periods = if metric.is_sparse_signal() { 1 } else { WEEK };
        Self {
            metric,
            transform: Transform::RollingMean {
                window: WEEK,
                min_periods,
            },
            shift: 0,
            scope: Scope::Own,
        }
    }

    /// Same feature lagged by `days`
    pub const fn shifted(mut self, days: usize) -> Self {
        self.shift = days;
        self
    }

    /// Same feature taken from another scope
    pub const fn scoped(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Compute the feature on a daily matrix of its metric
    pub fn compute(&self, daily: &Matrix) -> Result<Matrix> {
        let transformed = match self.transform {
            Transform::Level => daily.clone(),
            Transform::Diff(lag) => daily.diff(lag),
            Transform::RollingMean {
                window,
                min_periods,
            } => daily.rolling_mean(window, min_periods)?,
        };
        if self.shift == 0 {
            return Ok(transformed);
        }
        Ok(transformed.shift(self.shift as isize))
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.metric)?;
        match self.transform {
            Transform::Level => {}
            Transform::Diff(lag) => write!(f, ".diff({})", lag)?,
            Transform::RollingMean { window, .. } => write!(f, ".rolling({}).mean()", window)?,
        }
        if self.shift > 0 {
            write!(f, ".shift({})", self.shift)?;
        }
        match self.scope {
            Scope::Own => Ok(()),
            Scope::State => f.write_str(".state"),
            Scope::Cbsa => f.write_str(".cbsa"),
        }
    }
}

/// One catalogue entry: a feature and its ordered clean plan
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpec {
    pub id: FeatureId,
    pub steps: Vec<CleanStep>,
}

/// Enumerated features of a universe, in catalogue order
pub fn catalog(universe: Universe) -> Vec<FeatureSpec> {
    match universe {
        Universe::National => national::catalog(),
        Universe::State => state::catalog(),
        Universe::County => county::catalog(),
    }
}

/// Rendered name to feature, per universe, built once from the catalogues
fn name_index() -> &'static HashMap<Universe, HashMap<String, FeatureId>> {
    static INDEX: OnceLock<HashMap<Universe, HashMap<String, FeatureId>>> = OnceLock::new();
    INDEX.get_or_init(|| {
        Universe::ALL
            .iter()
            .map(|universe| {
                let names: HashMap<String, FeatureId> = catalog(*universe)
                    .into_iter()
                    .map(|spec| (spec.id.to_string(), spec.id))
                    .collect();
                (*universe, names)
            })
            .collect()
    })
}

/// Resolve a feature name against a universe's catalogue
pub fn lookup(universe: Universe, name: &str) -> Result<FeatureId> {
    name_index()
        .get(&universe)
        .and_then(|names| names.get(name))
        .copied()
        .ok_or_else(|| {
            ForecastError::UnknownFeature(format!("'{}' is not a {} feature", name, universe))
        })
}

/// Names resolve against the union of the catalogues; they are never split
/// into their parts.
impl FromStr for FeatureId {
    type Err = ForecastError;

    fn from_str(name: &str) -> Result<Self> {
        Universe::ALL
            .iter()
            .find_map(|universe| name_index().get(universe)?.get(name).copied())
            .ok_or_else(|| ForecastError::UnknownFeature(format!("'{}' is not a feature", name)))
    }
}

/// Feature matrices of one universe
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    matrices: BTreeMap<FeatureId, Matrix>,
}

impl FeatureSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the matrix of a feature
    pub fn insert(&mut self, id: FeatureId, matrix: Matrix) {
        self.matrices.insert(id, matrix);
    }

    pub fn get(&self, id: &FeatureId) -> Option<&Matrix> {
        self.matrices.get(id)
    }

    /// Get a matrix by its rendered name
    pub fn get_by_name(&self, name: &str) -> Option<&Matrix> {
        let id = name.parse::<FeatureId>().ok()?;
        self.matrices.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FeatureId, &Matrix)> {
        self.matrices.iter()
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}

/// Raw panels as matrices on the daily grid `[start, today]`
#[derive(Debug, Clone)]
pub struct DailyMatrices {
    dates: Vec<NaiveDate>,
    matrices: BTreeMap<Metric, Matrix>,
}

impl DailyMatrices {
    /// Reshape and reindex every raw panel
    pub fn from_raw(raw: &RawData, start: NaiveDate, today: NaiveDate) -> Result<Self> {
        let dates = daily_grid(start, today)?;
        let mut matrices = BTreeMap::new();
        for metric in raw.metrics() {
            if let Some(panel) = raw.get(metric) {
                info!("Transforming {}", metric);
                let matrix = to_matrix(panel).reindex_dates(&dates);
                debug!("{}: {} x {}", metric, matrix.nrows(), matrix.ncols());
                matrices.insert(metric, matrix);
            }
        }
        Ok(Self { dates, matrices })
    }

    /// Daily matrix of a metric; absent metrics are a matrix without columns
    pub fn get(&self, metric: Metric) -> Matrix {
        match self.matrices.get(&metric) {
            Some(matrix) => matrix.clone(),
            None => Matrix::from_parts(
                self.dates.clone(),
                Vec::new(),
                Array2::zeros((self.dates.len(), 0)),
            ),
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }
}

/// Compute every catalogue feature of a universe on the weekly grid
pub fn build_features(
    universe: Universe,
    daily: &DailyMatrices,
    weekly: &[NaiveDate],
) -> Result<FeatureSet> {
    info!("Processing {} features", universe);
    let mut out = FeatureSet::new();
    for spec in catalog(universe) {
        let matrix = spec.id.compute(&daily.get(spec.id.metric))?;
        out.insert(spec.id, matrix.reindex_dates(weekly));
    }
    Ok(out)
}

/// Run every feature of a universe through its clean plan
pub fn clean_features(
    universe: Universe,
    built: &FeatureSet,
    locations: &Locations,
) -> Result<FeatureSet> {
    let mut out = FeatureSet::new();
    for spec in catalog(universe) {
        let Some(matrix) = built.get(&spec.id) else {
            return Err(ForecastError::UnknownFeature(format!(
                "{} was not built for the {} universe",
                spec.id, universe
            )));
        };
        info!("Processing {}", spec.id);
        let cleaned = apply_plan(matrix, &spec.steps, universe, locations)?;
        debug!("{}: {} gaps left", spec.id, cleaned.count_missing());
        out.insert(spec.id, cleaned);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_names() {
        let id = FeatureId::rolling(Metric::AppleDrivingMobility).shifted(7);
        assert_eq!(id.to_string(), "Apple_DrivingMobility.rolling(7).mean().shift(7)");
        let id = FeatureId::diff(Metric::JhuConfirmedCases, 7).scoped(Scope::Cbsa);
        assert_eq!(id.to_string(), "JHU_ConfirmedCases.diff(7).cbsa");
        assert_eq!(FeatureId::level(Metric::JhuConfirmedCases).to_string(), "JHU_ConfirmedCases");
    }

    #[test]
    fn test_names_resolve_to_catalogued_features() {
        let id: FeatureId = "JHU_ConfirmedCases.diff(7).cbsa".parse().unwrap();
        assert_eq!(id, FeatureId::diff(Metric::JhuConfirmedCases, 7).scoped(Scope::Cbsa));
        assert!("JHU_ConfirmedCases.diff(3)".parse::<FeatureId>().is_err());

        // County-only names are not national features
        assert!(lookup(Universe::National, "JHU_ConfirmedCases.diff(7).cbsa").is_err());
        assert_eq!(lookup(Universe::County, "JHU_ConfirmedCases.diff(7).cbsa").unwrap(), id);
    }

    #[test]
    fn test_sparse_signal_min_periods() {
        let id = FeatureId::rolling(Metric::GhtRawSearch);
        assert_eq!(
            id.transform,
            Transform::RollingMean {
                window: 7,
                min_periods: 1
            }
        );
    }

    #[test]
    fn test_catalog_names_unique() {
        for universe in Universe::ALL {
            let names: Vec<String> = catalog(universe).iter().map(|s| s.id.to_string()).collect();
            let mut deduped = names.clone();
            deduped.sort();
            deduped.dedup();
            assert_eq!(names.len(), deduped.len(), "{} catalogue", universe);
        }
    }

    #[test]
    fn test_lookup_unknown_feature() {
        assert!(lookup(Universe::National, "JHU_ConfirmedCases.diff(7)").is_ok());
        assert!(matches!(
            lookup(Universe::National, "JHU_ConfirmedCases.diff(7).cbsa"),
            Err(ForecastError::UnknownFeature(_))
        ));
    }
}
