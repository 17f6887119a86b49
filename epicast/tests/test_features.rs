use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate};
use epicast::data::{Metric, RawData};
use epicast::features::{
    build_features, catalog, clean_features, lookup, CleanStep, DailyMatrices, FeatureSet,
};
use epicast::locations::{Location, Locations, Universe};
use epicast::panel::Panel;
use epicast::utils::{parse_date, weekly_grid};
use epicast::ForecastError;
use rstest::rstest;

const START: &str = "2020-03-01";
const TODAY: &str = "2020-03-14";
const MOBILITY: &str = "Apple_DrivingMobility.rolling(7).mean()";

fn d(text: &str) -> NaiveDate {
    parse_date(text).unwrap()
}

fn location(id: &str, kind: Universe, state: Option<&str>, cbsa: Option<&str>) -> Location {
    Location {
        id: id.to_string(),
        location: id.to_string(),
        location_type: kind,
        population: Some(1e5),
        hospital_licensed_beds: Some(100.0),
        state: state.map(str::to_string),
        cbsa: cbsa.map(str::to_string),
    }
}

fn locations() -> Locations {
    Locations::new(vec![
        location("US", Universe::National, None, None),
        location("NY", Universe::State, None, None),
        location("NJ", Universe::State, None, None),
        location("c1", Universe::County, Some("NY"), Some("X")),
        location("c2", Universe::County, Some("NY"), Some("X")),
        location("c3", Universe::County, Some("NY"), None),
        location("c4", Universe::County, Some("NJ"), None),
        location("c5", Universe::County, Some("NY"), Some("X")),
    ])
    .unwrap()
}

// Constant daily series for each (id, value), skipping the given days
fn daily_panel(series: &[(&str, f64)], skip: impl Fn(&str, i64) -> bool) -> Panel {
    let start = d(START);
    let mut records = Vec::new();
    for offset in 0..14 {
        let date = start + Duration::days(offset);
        for (id, value) in series {
            if !skip(*id, offset) {
                records.push((date, *id, *value));
            }
        }
    }
    Panel::from_records("raw", records)
}

fn cleaned(universe: Universe, raw: &RawData) -> FeatureSet {
    let daily = DailyMatrices::from_raw(raw, d(START), d(TODAY)).unwrap();
    let weekly = weekly_grid(d(START), d(TODAY)).unwrap();
    let built = build_features(universe, &daily, &weekly).unwrap();
    assert_eq!(built.len(), catalog(universe).len());
    clean_features(universe, &built, &locations()).unwrap()
}

fn county_features() -> FeatureSet {
    let raw = RawData::new()
        .with(
            Metric::AppleDrivingMobility,
            daily_panel(&[("c1", 10.0), ("c2", 20.0), ("NY", 100.0)], |_, _| false),
        )
        .with(
            Metric::JhuConfirmedCases,
            daily_panel(&[("c1", 5.0)], |_, _| false),
        );
    cleaned(Universe::County, &raw)
}

#[test]
fn test_signal_gap_in_second_week_is_forward_filled() {
    let raw = RawData::new().with(
        Metric::AppleDrivingMobility,
        daily_panel(&[("NY", 30.0), ("NJ", 10.0)], |id, day| id == "NY" && day >= 7),
    );
    let features = cleaned(Universe::State, &raw);
    let mobility = features.get_by_name(MOBILITY).unwrap();

    assert_eq!(mobility.dates(), &[d("2020-03-07"), d("2020-03-14")]);
    assert_eq!(mobility.get(d("2020-03-14"), "NY"), Some(30.0));
    assert_eq!(mobility.get(d("2020-03-14"), "NJ"), Some(10.0));
}

#[test]
fn test_county_signal_fallback_hierarchy() {
    let features = county_features();
    let mobility = features.get_by_name(MOBILITY).unwrap();
    let week = d("2020-03-07");

    assert_eq!(mobility.ids().len(), 5);
    // Observed values stay as they are
    assert_eq!(mobility.get(week, "c1"), Some(10.0));
    // c5 shares a CBSA with c1 and c2
    assert_eq!(mobility.get(week, "c5"), Some(15.0));
    // c3 has no CBSA and takes its state's value
    assert_eq!(mobility.get(week, "c3"), Some(100.0));
    // c4 has neither and takes the cross-sectional mean
    assert_relative_eq!(
        mobility.get(week, "c4").unwrap(),
        (10.0 + 20.0 + 100.0 + 15.0) / 4.0
    );
}

#[test]
fn test_count_features_are_complete_after_cleaning() {
    let features = county_features();
    for spec in catalog(Universe::County) {
        if !spec.steps.contains(&CleanStep::FillZero) {
            continue;
        }
        let matrix = features.get(&spec.id).unwrap();
        assert_eq!(matrix.count_missing(), 0, "{} has gaps", spec.id);
    }
}

#[test]
fn test_cbsa_scoped_feature_is_averaged() {
    let features = county_features();
    let own = features.get_by_name("JHU_ConfirmedCases.diff(7)").unwrap();
    let cbsa = features.get_by_name("JHU_ConfirmedCases.diff(7).cbsa").unwrap();
    let week = d("2020-03-14");

    // Constant cumulative counts: no new cases anywhere
    assert_eq!(own.get(week, "c1"), Some(0.0));
    assert_eq!(cbsa.get(week, "c1"), Some(0.0));
    assert_eq!(cbsa.get(week, "c4"), Some(0.0));
}

#[rstest]
#[case(Universe::National, "JHU_ConfirmedCases.diff(7)", true)]
#[case(Universe::State, "Apple_DrivingMobility.rolling(7).mean().shift(7)", true)]
#[case(Universe::County, "JHU_ConfirmedCases.diff(7).cbsa", true)]
#[case(Universe::National, "JHU_ConfirmedCases.diff(7).cbsa", false)]
#[case(Universe::State, "jhu_confirmedcases", false)]
fn test_lookup_by_name(#[case] universe: Universe, #[case] name: &str, #[case] known: bool) {
    let result = lookup(universe, name);
    if known {
        assert_eq!(result.unwrap().to_string(), name);
    } else {
        assert!(matches!(result, Err(ForecastError::UnknownFeature(_))));
    }
}
