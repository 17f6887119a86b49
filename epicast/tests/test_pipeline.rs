use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate};
use epicast::data::Metric;
use epicast::features::{FeatureId, FeatureSet};
use epicast::hub::ForecastType;
use epicast::locations::{Location, Locations, Universe};
use epicast::models::BayesianLinear;
use epicast::panel::Matrix;
use epicast::pipeline::{ForecastPipeline, PipelineConfig, TrainingTable};
use epicast::utils::{parse_date, weekly_grid};
use epicast::ForecastError;
use ndarray::Array2;
use rstest::rstest;
use std::sync::Arc;

const START: &str = "2020-03-01";
const TODAY: &str = "2020-04-25";

fn state(id: &str, population: f64) -> Location {
    Location {
        id: id.to_string(),
        location: id.to_uppercase(),
        location_type: Universe::State,
        population: Some(population),
        hospital_licensed_beds: None,
        state: None,
        cbsa: None,
    }
}

fn locations() -> Arc<Locations> {
    Arc::new(Locations::new(vec![state("a", 1e5), state("b", 2e5)]).unwrap())
}

fn dates() -> Vec<NaiveDate> {
    weekly_grid(parse_date(START).unwrap(), parse_date(TODAY).unwrap()).unwrap()
}

fn diff_feature() -> FeatureId {
    FeatureId::diff(Metric::JhuConfirmedCases, 7)
}

// Feature x = week index (+10 for b), target = 2x + 1, last week unobserved
fn fixtures() -> (FeatureSet, Matrix) {
    let dates = dates();
    let n = dates.len();
    let ids = vec!["a".to_string(), "b".to_string()];
    let x = Array2::from_shape_fn((n, 2), |(i, j)| i as f64 + 10.0 * j as f64);
    let y = Array2::from_shape_fn((n, 2), |(i, j)| {
        if i + 1 == n {
            f64::NAN
        } else {
            2.0 * x[[i, j]] + 1.0
        }
    });

    let mut features = FeatureSet::new();
    features.insert(diff_feature(), Matrix::new(dates.clone(), ids.clone(), x).unwrap());
    (features, Matrix::new(dates, ids, y).unwrap())
}

fn config(train_window: usize) -> PipelineConfig {
    PipelineConfig {
        universe: Universe::State,
        weeks_ahead: 1,
        train_window,
        feature_columns: vec!["JHU_ConfirmedCases.diff(7)".to_string()],
    }
}

fn pipeline(train_window: usize) -> ForecastPipeline<BayesianLinear> {
    let (features, target) = fixtures();
    ForecastPipeline::new(
        config(train_window),
        &features,
        &target,
        dates(),
        parse_date(TODAY).unwrap(),
        locations(),
        BayesianLinear::default(),
    )
    .unwrap()
}

#[test]
fn test_training_table_joins_features_and_target() {
    let (features, target) = fixtures();
    let table = TrainingTable::build(&features, &target);

    assert_eq!(table.len(), dates().len() * 2);
    let rows = table.rows_for(dates()[2]);
    assert_eq!(rows.len(), 2);
    assert_eq!(table.keys()[rows.start].1, "a");
    assert_relative_eq!(table.target(rows.start), 5.0);
}

#[test]
fn test_unknown_feature_column_is_rejected() {
    let (features, target) = fixtures();
    let mut settings = config(4);
    settings.feature_columns = vec!["NotAFeature".to_string()];
    let result = ForecastPipeline::new(
        settings,
        &features,
        &target,
        dates(),
        parse_date(TODAY).unwrap(),
        locations(),
        BayesianLinear::default(),
    );
    assert!(matches!(result, Err(ForecastError::UnknownFeature(_))));
}

#[test]
fn test_predict_before_fit_fails() {
    let pipeline = pipeline(4);
    assert!(matches!(
        pipeline.predict(0, false),
        Err(ForecastError::NotFitted(_))
    ));
    assert!(matches!(
        pipeline.predict_proba(0, false),
        Err(ForecastError::NotFitted(_))
    ));
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
fn test_training_window_ends_before_instance(#[case] offset: usize) {
    let pipeline = pipeline(4);
    let train_dates = pipeline.train_dates(offset).unwrap();
    let instance = pipeline.instance_date(offset).unwrap();

    assert_eq!(train_dates.len(), 4);
    let last = *train_dates.last().unwrap();
    assert!(last + Duration::weeks(1) <= instance);
}

#[test]
fn test_window_longer_than_history_is_untrainable() {
    let mut pipeline = pipeline(dates().len());
    assert!(matches!(
        pipeline.fit(0),
        Err(ForecastError::UntrainableWindow(_))
    ));
}

#[test]
fn test_window_over_unobserved_target_is_untrainable() {
    let (features, target) = fixtures();
    // Blank out the target of one week inside the offset-0 window
    let n = target.nrows();
    let mut values = target.values().clone();
    values.row_mut(n - 3).fill(f64::NAN);
    let target = Matrix::new(target.dates().to_vec(), target.ids().to_vec(), values).unwrap();

    let mut pipeline = ForecastPipeline::new(
        config(4),
        &features,
        &target,
        dates(),
        parse_date(TODAY).unwrap(),
        locations(),
        BayesianLinear::default(),
    )
    .unwrap();
    assert!(matches!(
        pipeline.fit(0),
        Err(ForecastError::UntrainableWindow(_))
    ));
}

#[test]
fn test_point_forecast_rows() {
    let mut pipeline = pipeline(4);
    pipeline.fit(0).unwrap();
    let records = pipeline.predict(0, false).unwrap();

    let instance = *dates().last().unwrap();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.kind, ForecastType::Point);
        assert_eq!(record.quantile, None);
        assert_eq!(record.target, "1 wk ahead inc case");
        assert_eq!(record.forecast_date, parse_date(TODAY).unwrap());
        assert_eq!(record.target_end_date, instance + Duration::weeks(1));
    }

    let n = dates().len() as f64 - 1.0;
    assert_relative_eq!(records[0].value, 2.0 * n + 1.0, epsilon = 0.05);
    assert_relative_eq!(records[1].value, 2.0 * (n + 10.0) + 1.0, epsilon = 0.05);
}

#[test]
fn test_undo_normalization_scales_by_population() {
    let mut pipeline = pipeline(4);
    pipeline.fit(0).unwrap();
    let normalized = pipeline.predict(0, false).unwrap();
    let raw = pipeline.predict(0, true).unwrap();

    assert_relative_eq!(raw[0].value, normalized[0].value, epsilon = 1e-9);
    assert_relative_eq!(raw[1].value, 2.0 * normalized[1].value, epsilon = 1e-9);
}

#[test]
fn test_quantile_rows_per_entity_and_level() {
    let levels = vec![0.1, 0.5, 0.9];
    let mut pipeline = pipeline(4).with_quantiles(levels.clone()).unwrap();
    pipeline.fit(0).unwrap();
    let records = pipeline.predict_proba(0, false).unwrap();

    assert_eq!(records.len(), 2 * levels.len());
    for id in ["a", "b"] {
        let rows: Vec<_> = records.iter().filter(|r| r.id == id).collect();
        assert_eq!(rows.len(), levels.len());
        assert!(rows.iter().all(|r| r.kind == ForecastType::Quantile));
        assert!(rows[0].value <= rows[1].value && rows[1].value <= rows[2].value);
    }
}

#[test]
fn test_backfill_instance_moves_target_end_date() {
    let mut pipeline = pipeline(4);
    pipeline.fit(2).unwrap();
    let records = pipeline.predict(2, false).unwrap();

    let dates = dates();
    let instance = dates[dates.len() - 3];
    assert!(records
        .iter()
        .all(|r| r.target_end_date == instance + Duration::weeks(1)));
}

#[test]
fn test_entities_with_incomplete_features_are_skipped() {
    let (mut features, target) = fixtures();
    let matrix = features.get(&diff_feature()).unwrap().clone();
    let n = matrix.nrows();
    let mut values = matrix.values().clone();
    values[[n - 1, 1]] = f64::NAN;
    features.insert(
        diff_feature(),
        Matrix::new(matrix.dates().to_vec(), matrix.ids().to_vec(), values).unwrap(),
    );

    let mut pipeline = ForecastPipeline::new(
        config(4),
        &features,
        &target,
        dates(),
        parse_date(TODAY).unwrap(),
        locations(),
        BayesianLinear::default(),
    )
    .unwrap();
    pipeline.fit(0).unwrap();
    let records = pipeline.predict(0, false).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "a");
}

fn with_unobserved_mobility() -> (FeatureSet, Matrix, FeatureId) {
    let (mut features, target) = fixtures();
    let mobility = FeatureId::rolling(Metric::AppleDrivingMobility);
    features.insert(
        mobility,
        Matrix::missing(dates(), vec!["a".to_string(), "b".to_string()]).unwrap(),
    );
    (features, target, mobility)
}

#[test]
fn test_unobserved_feature_column_is_left_out() {
    let (features, target, mobility) = with_unobserved_mobility();
    let mut settings = config(4);
    settings.feature_columns.push(mobility.to_string());

    let mut pipeline = ForecastPipeline::new(
        settings,
        &features,
        &target,
        dates(),
        parse_date(TODAY).unwrap(),
        locations(),
        BayesianLinear::default(),
    )
    .unwrap();
    pipeline.fit(0).unwrap();
    assert_eq!(pipeline.model_features(), vec![diff_feature()]);

    let records = pipeline.predict(0, false).unwrap();
    assert_eq!(records.len(), 2);
    let n = dates().len() as f64 - 1.0;
    assert_relative_eq!(records[0].value, 2.0 * n + 1.0, epsilon = 0.05);
}

#[test]
fn test_window_without_any_observed_feature_is_untrainable() {
    let (features, target, mobility) = with_unobserved_mobility();
    let mut settings = config(4);
    settings.feature_columns = vec![mobility.to_string()];

    let mut pipeline = ForecastPipeline::new(
        settings,
        &features,
        &target,
        dates(),
        parse_date(TODAY).unwrap(),
        locations(),
        BayesianLinear::default(),
    )
    .unwrap();
    assert!(matches!(
        pipeline.fit(0),
        Err(ForecastError::UntrainableWindow(_))
    ));
    assert!(pipeline.fitted().is_none());
}
