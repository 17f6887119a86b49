//! Hub-format forecast tables and visualization exports

use crate::error::Result;
use crate::locations::Locations;
use crate::panel::{Matrix, DATES_COLUMN};
use chrono::NaiveDate;
use log::{info, warn};
use ndarray::Array2;
use polars::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::path::Path;

/// Hub column names, in output order
pub const HUB_COLUMNS: [&str; 7] = [
    "forecast_date",
    "target",
    "target_end_date",
    "location",
    "type",
    "quantile",
    "value",
];

/// Kind of forecast row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ForecastType {
    Point,
    Quantile,
}

impl ForecastType {
    pub fn name(&self) -> &'static str {
        match self {
            ForecastType::Point => "point",
            ForecastType::Quantile => "quantile",
        }
    }
}

impl fmt::Display for ForecastType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One prediction for one entity, keyed by entity id
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRecord {
    pub forecast_date: NaiveDate,
    /// e.g. `"1 wk ahead inc case"`
    pub target: String,
    pub target_end_date: NaiveDate,
    pub id: String,
    pub kind: ForecastType,
    /// Level of a quantile row, `None` for point rows
    pub quantile: Option<f64>,
    pub value: f64,
}

/// One row of a hub submission
#[derive(Debug, Clone, PartialEq)]
pub struct HubRow {
    pub forecast_date: NaiveDate,
    pub target: String,
    pub target_end_date: NaiveDate,
    pub location: String,
    pub kind: ForecastType,
    pub quantile: Option<f64>,
    pub value: f64,
}

impl HubRow {
    fn sort_key_cmp(&self, other: &Self) -> Ordering {
        self.target
            .cmp(&other.target)
            .then(self.target_end_date.cmp(&other.target_end_date))
            .then(self.location.cmp(&other.location))
            .then(self.kind.cmp(&other.kind))
            .then(match (self.quantile, other.quantile) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                (a, b) => a.is_some().cmp(&b.is_some()),
            })
    }
}

/// Submission table in hub format
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HubTable {
    rows: Vec<HubRow>,
}

impl HubTable {
    /// Map ids to hub codes, round values to whole cases floored at zero and
    /// sort by target, end date, location, type and quantile.
    ///
    /// Records of ids without a hub code are skipped.
    pub fn from_records(records: &[ForecastRecord], locations: &Locations) -> Self {
        let mut skipped = BTreeSet::new();
        let mut rows: Vec<HubRow> = records
            .iter()
            .filter_map(|r| {
                let Some(code) = locations.hub_code(&r.id) else {
                    skipped.insert(r.id.as_str());
                    return None;
                };
                Some(HubRow {
                    forecast_date: r.forecast_date,
                    target: r.target.clone(),
                    target_end_date: r.target_end_date,
                    location: code.to_string(),
                    kind: r.kind,
                    quantile: r.quantile,
                    value: whole_cases(r.value),
                })
            })
            .collect();
        if !skipped.is_empty() {
            warn!("No hub location code for {} ids, e.g. {:?}", skipped.len(), skipped.first());
        }
        rows.sort_by(|a, b| a.sort_key_cmp(b));
        Self { rows }
    }

    pub fn rows(&self) -> &[HubRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Convert to a polars frame with the hub columns
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let forecast_dates: Vec<NaiveDate> = self.rows.iter().map(|r| r.forecast_date).collect();
        let targets: Vec<&str> = self.rows.iter().map(|r| r.target.as_str()).collect();
        let end_dates: Vec<NaiveDate> = self.rows.iter().map(|r| r.target_end_date).collect();
        let locations: Vec<&str> = self.rows.iter().map(|r| r.location.as_str()).collect();
        let kinds: Vec<&str> = self.rows.iter().map(|r| r.kind.name()).collect();
        let quantiles: Vec<Option<f64>> = self.rows.iter().map(|r| r.quantile).collect();
        let values: Vec<f64> = self.rows.iter().map(|r| r.value).collect();

        let df = DataFrame::new(vec![
            Series::new(HUB_COLUMNS[0].into(), forecast_dates).into(),
            Series::new(HUB_COLUMNS[1].into(), targets).into(),
            Series::new(HUB_COLUMNS[2].into(), end_dates).into(),
            Series::new(HUB_COLUMNS[3].into(), locations).into(),
            Series::new(HUB_COLUMNS[4].into(), kinds).into(),
            Series::new(HUB_COLUMNS[5].into(), quantiles).into(),
            Series::new(HUB_COLUMNS[6].into(), values).into(),
        ])?;
        Ok(df)
    }

    /// Write the table as CSV
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut df = self.to_dataframe()?;
        let file = File::create(path)?;
        CsvWriter::new(file).finish(&mut df)?;
        info!("Wrote {} hub rows to {}", self.len(), path.display());
        Ok(())
    }
}

/// Round half to even, never below zero
fn whole_cases(value: f64) -> f64 {
    let rounded = value.round_ties_even();
    if rounded > 0.0 {
        rounded
    } else {
        0.0
    }
}

/// Hub submission file name; backfilled runs carry their offset as prefix
pub fn hub_file_name(today: NaiveDate, model_name: &str, instance_offset: usize) -> String {
    if instance_offset == 0 {
        format!("{}-{}.csv", today, model_name)
    } else {
        format!("Backfill-{}-{}-{}.csv", instance_offset, today, model_name)
    }
}

/// Wide matrix of point forecasts: target end dates by hub location code.
/// A later record for the same cell replaces an earlier one.
pub fn pivot_forecasts(records: &[ForecastRecord], locations: &Locations) -> Matrix {
    let points: Vec<(&ForecastRecord, &str)> = records
        .iter()
        .filter(|r| r.kind == ForecastType::Point)
        .filter_map(|r| locations.hub_code(&r.id).map(|code| (r, code)))
        .collect();

    let dates: Vec<NaiveDate> = points
        .iter()
        .map(|(r, _)| r.target_end_date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let codes: Vec<String> = points
        .iter()
        .map(|(_, code)| *code)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut values = Array2::from_elem((dates.len(), codes.len()), f64::NAN);
    for (record, code) in points {
        if let (Ok(i), Ok(j)) = (
            dates.binary_search(&record.target_end_date),
            codes.binary_search_by(|c| c.as_str().cmp(code)),
        ) {
            values[[i, j]] = record.value;
        }
    }
    Matrix::from_parts(dates, codes, values)
}

/// Restrict a matrix to `ids` and rename its columns to hub location codes.
/// Ids without a hub code keep their id.
pub fn relabel_to_hub_codes(matrix: &Matrix, ids: &[String], locations: &Locations) -> Result<Matrix> {
    let selected = crate::transforms::select_universe(matrix, ids, true);
    let columns = selected
        .ids()
        .iter()
        .enumerate()
        .map(|(j, id)| {
            let code = locations.hub_code(id).unwrap_or(id.as_str()).to_string();
            (code, selected.values().column(j).to_vec())
        })
        .collect();
    Matrix::from_columns(selected.dates().to_vec(), columns)
}

/// Write a matrix as a wide CSV with a `dates` column followed by one column
/// per id. Gaps are written as empty fields.
pub fn write_matrix_csv<P: AsRef<Path>>(matrix: &Matrix, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut columns: Vec<Column> = Vec::with_capacity(matrix.ncols() + 1);
    columns.push(Series::new(DATES_COLUMN.into(), matrix.dates().to_vec()).into());
    for (j, id) in matrix.ids().iter().enumerate() {
        let values: Vec<Option<f64>> = matrix
            .values()
            .column(j)
            .iter()
            .map(|v| if v.is_nan() { None } else { Some(*v) })
            .collect();
        columns.push(Series::new(id.as_str().into(), values).into());
    }
    let mut df = DataFrame::new(columns)?;
    let file = File::create(path)?;
    CsvWriter::new(file).finish(&mut df)?;
    info!("Wrote {} x {} matrix to {}", matrix.nrows(), matrix.ncols(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locations::{Location, Universe};
    use crate::utils::parse_date;

    fn d(text: &str) -> NaiveDate {
        parse_date(text).unwrap()
    }

    fn locations() -> Locations {
        let state = |id: &str, code: &str| Location {
            id: id.to_string(),
            location: code.to_string(),
            location_type: Universe::State,
            population: Some(1e5),
            hospital_licensed_beds: None,
            state: None,
            cbsa: None,
        };
        Locations::new(vec![state("b", "02"), state("a", "01")]).unwrap()
    }

    fn record(id: &str, kind: ForecastType, quantile: Option<f64>, value: f64) -> ForecastRecord {
        ForecastRecord {
            forecast_date: d("2020-06-01"),
            target: "1 wk ahead inc case".to_string(),
            target_end_date: d("2020-06-06"),
            id: id.to_string(),
            kind,
            quantile,
            value,
        }
    }

    #[test]
    fn test_rows_sorted_rounded_and_floored() {
        let table = HubTable::from_records(
            &[
                record("b", ForecastType::Point, None, 2.5),
                record("a", ForecastType::Quantile, Some(0.9), -3.0),
                record("a", ForecastType::Quantile, Some(0.1), 7.6),
                record("a", ForecastType::Point, None, 4.4),
                record("zz", ForecastType::Point, None, 1.0),
            ],
            &locations(),
        );
        let summary: Vec<(&str, ForecastType, Option<f64>, f64)> = table
            .rows()
            .iter()
            .map(|r| (r.location.as_str(), r.kind, r.quantile, r.value))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("01", ForecastType::Point, None, 4.0),
                ("01", ForecastType::Quantile, Some(0.1), 8.0),
                ("01", ForecastType::Quantile, Some(0.9), 0.0),
                ("02", ForecastType::Point, None, 2.0),
            ]
        );
    }

    #[test]
    fn test_file_names() {
        assert_eq!(hub_file_name(d("2020-06-01"), "Team-Model", 0), "2020-06-01-Team-Model.csv");
        assert_eq!(
            hub_file_name(d("2020-06-01"), "Team-Model", 2),
            "Backfill-2-2020-06-01-Team-Model.csv"
        );
    }

    #[test]
    fn test_pivot_uses_point_rows() {
        let m = pivot_forecasts(
            &[
                record("a", ForecastType::Point, None, 4.4),
                record("a", ForecastType::Quantile, Some(0.5), 9.0),
            ],
            &locations(),
        );
        assert_eq!(m.ids(), &["01".to_string()]);
        assert_eq!(m.get(d("2020-06-06"), "01"), Some(4.4));
    }
}
