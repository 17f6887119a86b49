use chrono::NaiveDate;
use epicast::hub::{ForecastRecord, ForecastType, HubTable, HUB_COLUMNS};
use epicast::locations::{Location, Locations, Universe};
use epicast::utils::parse_date;
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

fn d(text: &str) -> NaiveDate {
    parse_date(text).unwrap()
}

fn locations() -> Locations {
    let row = |id: &str, code: &str, kind: Universe| Location {
        id: id.to_string(),
        location: code.to_string(),
        location_type: kind,
        population: Some(1e6),
        hospital_licensed_beds: None,
        state: None,
        cbsa: None,
    };
    Locations::new(vec![
        row("US", "US", Universe::National),
        row("Texas_US", "48", Universe::State),
        row("Ohio_US", "39", Universe::State),
    ])
    .unwrap()
}

fn record(id: &str, weeks: usize, quantile: Option<f64>, value: f64) -> ForecastRecord {
    ForecastRecord {
        forecast_date: d("2020-11-16"),
        target: format!("{} wk ahead inc case", weeks),
        target_end_date: d("2020-11-14") + chrono::Duration::weeks(weeks as i64),
        id: id.to_string(),
        kind: if quantile.is_some() {
            ForecastType::Quantile
        } else {
            ForecastType::Point
        },
        quantile,
        value,
    }
}

fn records() -> Vec<ForecastRecord> {
    vec![
        record("Texas_US", 2, None, 1500.4),
        record("Texas_US", 1, Some(0.975), 2100.6),
        record("Ohio_US", 1, None, -12.0),
        record("US", 1, None, 99_999.5),
        record("Texas_US", 1, Some(0.025), 800.0),
        record("Texas_US", 1, None, 1200.0),
    ]
}

#[test]
fn test_hub_rows_order() {
    let table = HubTable::from_records(&records(), &locations());
    let order: Vec<(String, String, String)> = table
        .rows()
        .iter()
        .map(|r| {
            (
                r.target.clone(),
                r.location.clone(),
                r.quantile.map(|q| q.to_string()).unwrap_or_default(),
            )
        })
        .collect();

    let expected: Vec<(String, String, String)> = [
        ("1 wk ahead inc case", "39", ""),
        ("1 wk ahead inc case", "48", ""),
        ("1 wk ahead inc case", "48", "0.025"),
        ("1 wk ahead inc case", "48", "0.975"),
        ("1 wk ahead inc case", "US", ""),
        ("2 wk ahead inc case", "48", ""),
    ]
    .iter()
    .map(|(a, b, c)| (a.to_string(), b.to_string(), c.to_string()))
    .collect();
    assert_eq!(order, expected);
}

#[test]
fn test_hub_values_are_whole_non_negative_cases() {
    let table = HubTable::from_records(&records(), &locations());
    let values: Vec<f64> = table.rows().iter().map(|r| r.value).collect();
    assert_eq!(values, vec![0.0, 1200.0, 800.0, 2101.0, 100_000.0, 1500.0]);
}

#[test]
fn test_hub_dataframe_schema() {
    let table = HubTable::from_records(&records(), &locations());
    let df = table.to_dataframe().unwrap();
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    assert_eq!(names, HUB_COLUMNS.to_vec());
    assert_eq!(df.height(), 6);
    assert_eq!(df.column("quantile").unwrap().null_count(), 4);
}

#[test]
fn test_hub_csv_written() {
    let table = HubTable::from_records(&records(), &locations());
    let file = NamedTempFile::new().unwrap();
    table.write_csv(file.path()).unwrap();

    let mut reader = csv::Reader::from_path(file.path()).unwrap();
    let first = reader.records().next().unwrap().unwrap();
    assert_eq!(&first[0], "2020-11-16");
    assert_eq!(&first[2], "2020-11-21");
    assert_eq!(&first[3], "39");
    assert_eq!(&first[4], "point");
    assert_eq!(&first[5], "");
}
