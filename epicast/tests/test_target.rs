use approx::assert_relative_eq;
use chrono::NaiveDate;
use epicast::locations::{Location, Locations, Universe};
use epicast::panel::Panel;
use epicast::target::{build_target, incidence_history, incident_cases};
use epicast::utils::parse_date;
use rstest::rstest;

fn d(text: &str) -> NaiveDate {
    parse_date(text).unwrap()
}

fn locations() -> Locations {
    Locations::new(vec![Location {
        id: "x".to_string(),
        location: "99".to_string(),
        location_type: Universe::State,
        population: Some(50_000.0),
        hospital_licensed_beds: None,
        state: None,
        cbsa: None,
    }])
    .unwrap()
}

// Three weekly cumulative reports
fn cumulative() -> Panel {
    Panel::from_records(
        "JHU_ConfirmedCases",
        vec![
            (d("2020-03-07"), "x", 100.0),
            (d("2020-03-14"), "x", 150.0),
            (d("2020-03-21"), "x", 250.0),
        ],
    )
}

#[test]
fn test_horizon_one_target_is_next_week_incidence() {
    let start = d("2020-03-01");
    let today = d("2020-03-21");
    let raw = incident_cases(&cumulative(), start, today, &locations()).unwrap();
    let target = build_target(&cumulative(), start, today, 1, &locations()).unwrap();

    // 100 new cases over 50k residents is 200 per 100k
    assert_relative_eq!(raw.get(d("2020-03-21"), "x").unwrap(), 200.0, epsilon = 1e-9);
    assert_relative_eq!(
        target.get(d("2020-03-14"), "x").unwrap(),
        raw.get(d("2020-03-21"), "x").unwrap(),
        epsilon = 1e-9
    );
    assert_relative_eq!(
        target.get(d("2020-03-07"), "x").unwrap(),
        raw.get(d("2020-03-14"), "x").unwrap(),
        epsilon = 1e-9
    );
    assert_eq!(target.get(d("2020-03-21"), "x"), None);
}

#[rstest]
#[case(vec![10.0, 5.0, 20.0, 0.0, 30.0])]
#[case(vec![50.0, 40.0, 30.0, 20.0, 10.0])]
#[case(vec![0.0, 0.0, 1.0, 1.0, 0.5])]
fn test_incidence_is_never_negative(#[case] series: Vec<f64>) {
    let start = d("2020-03-07");
    let records: Vec<(NaiveDate, &str, f64)> = series
        .iter()
        .enumerate()
        .map(|(i, v)| (start + chrono::Duration::weeks(i as i64), "x", *v))
        .collect();
    let panel = Panel::from_records("JHU_ConfirmedCases", records);
    let today = start + chrono::Duration::weeks(series.len() as i64 - 1);

    let raw = incident_cases(&panel, start, today, &locations()).unwrap();
    assert!(raw.values().iter().filter(|v| !v.is_nan()).all(|v| *v >= 0.0));
    assert_eq!(raw.count_missing(), 1);
}

#[test]
fn test_target_grid_matches_weekly_grid() {
    let target = build_target(&cumulative(), d("2020-03-01"), d("2020-03-24"), 2, &locations())
        .unwrap();
    assert_eq!(
        target.dates(),
        &[d("2020-03-07"), d("2020-03-14"), d("2020-03-21")]
    );
    assert_relative_eq!(target.get(d("2020-03-07"), "x").unwrap(), 200.0, epsilon = 1e-9);
    assert_eq!(target.get(d("2020-03-14"), "x"), None);
}

#[test]
fn test_history_uses_latest_report_before_each_week() {
    let panel = Panel::from_records(
        "JHU_ConfirmedCases",
        vec![
            (d("2020-03-05"), "x", 100.0),
            (d("2020-03-12"), "x", 200.0),
        ],
    );
    let history = incidence_history(&panel, d("2020-03-01"), d("2020-03-14"), &locations()).unwrap();
    assert_relative_eq!(history.get(d("2020-03-14"), "x").unwrap(), 200.0, epsilon = 1e-9);
}
