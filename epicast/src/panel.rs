//! Long (panel) and wide (matrix) representations of one metric
//!
//! A [`Panel`] holds `(date, id) -> value` observations, one row each. A
//! [`Matrix`] holds the same metric with dates as rows and entity ids as
//! columns. [`to_matrix`] and [`to_panel`] are the only bridges between the
//! two, so date-indexed operations can never run on entity-indexed data.
//!
//! Gaps are `NaN` inside a matrix and `None` inside a panel. A gap means "not
//! observed", never "observed as zero".

use crate::error::{ForecastError, Result};
use crate::utils::parse_date;
use chrono::NaiveDate;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use polars::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Name of the date column of a panel frame
pub const DATES_COLUMN: &str = "dates";
/// Name of the entity column of a panel frame
pub const ID_COLUMN: &str = "id";

/// Days between 0001-01-01 and 1970-01-01
const UNIX_EPOCH_FROM_CE: i32 = 719_163;

/// One observation of a panel series
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRow {
    /// Observation date
    pub date: NaiveDate,
    /// Entity id
    pub id: String,
    /// Observed value, `None` when unobserved
    pub value: Option<f64>,
}

impl PanelRow {
    /// Create a new panel row
    pub fn new(date: NaiveDate, id: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            date,
            id: id.into(),
            value,
        }
    }
}

/// Long form of one named metric
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    name: String,
    rows: Vec<PanelRow>,
}

impl Panel {
    /// Create a panel from rows. Duplicated `(date, id)` pairs are allowed
    /// here and resolved by [`to_matrix`].
    pub fn new(name: impl Into<String>, rows: Vec<PanelRow>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Create a panel from `(date, id, value)` triples
    pub fn from_records<I, S>(name: impl Into<String>, records: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, S, f64)>,
        S: Into<String>,
    {
        let rows = records
            .into_iter()
            .map(|(date, id, value)| {
                let value = if value.is_nan() { None } else { Some(value) };
                PanelRow::new(date, id, value)
            })
            .collect();
        Self::new(name, rows)
    }

    /// Read a panel from a frame with `dates`, `id` and exactly one value
    /// column.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        for required in [DATES_COLUMN, ID_COLUMN] {
            if !names.iter().any(|n| n == required) {
                return Err(ForecastError::AlignmentError(format!(
                    "Panel frame has no '{}' column (columns: {:?})",
                    required, names
                )));
            }
        }

        let value_columns: Vec<&String> = names
            .iter()
            .filter(|n| n.as_str() != DATES_COLUMN && n.as_str() != ID_COLUMN)
            .collect();
        if value_columns.len() != 1 {
            return Err(ForecastError::AlignmentError(format!(
                "Panel frame must hold exactly one value column, found {:?}",
                value_columns
            )));
        }
        let name = value_columns[0].clone();

        let dates = date_column(df.column(DATES_COLUMN)?)?;

        let ids_col = df.column(ID_COLUMN)?.cast(&DataType::String)?;
        let ids: Vec<String> = ids_col
            .str()?
            .into_iter()
            .map(|id| {
                id.map(str::to_string).ok_or_else(|| {
                    ForecastError::AlignmentError("Panel frame has a null id".to_string())
                })
            })
            .collect::<Result<_>>()?;

        let values_col = df.column(&name)?.cast(&DataType::Float64)?;
        let values: Vec<Option<f64>> = values_col
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();

        let rows = dates
            .into_iter()
            .zip(ids)
            .zip(values)
            .map(|((date, id), value)| PanelRow { date, id, value })
            .collect();

        Ok(Self { name, rows })
    }

    /// Convert to a frame with `dates`, `id` and the named value column
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let dates: Vec<NaiveDate> = self.rows.iter().map(|r| r.date).collect();
        let ids: Vec<String> = self.rows.iter().map(|r| r.id.clone()).collect();
        let values: Vec<Option<f64>> = self.rows.iter().map(|r| r.value).collect();

        let df = DataFrame::new(vec![
            Series::new(DATES_COLUMN.into(), dates).into(),
            Series::new(ID_COLUMN.into(), ids).into(),
            Series::new(self.name.as_str().into(), values).into(),
        ])?;
        Ok(df)
    }

    /// Get the metric name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the rows
    pub fn rows(&self) -> &[PanelRow] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the panel has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rename the value column
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Drop unobserved rows
    pub fn dropna(mut self) -> Self {
        self.rows.retain(|r| r.value.is_some());
        self
    }

    /// Rows sorted by `(date, id)`
    pub fn sorted(mut self) -> Self {
        self.rows
            .sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        self
    }

    /// Value for `(date, id)`; the last matching row wins.
    pub fn get(&self, date: NaiveDate, id: &str) -> Option<f64> {
        self.rows
            .iter()
            .rev()
            .find(|r| r.date == date && r.id == id)
            .and_then(|r| r.value)
    }
}

fn days_to_date(days: i32) -> Result<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_FROM_CE).ok_or_else(|| {
        ForecastError::AlignmentError(format!("Date out of range: {} days since epoch", days))
    })
}

fn date_column(column: &Column) -> Result<Vec<NaiveDate>> {
    let missing = || ForecastError::AlignmentError("Panel frame has a null date".to_string());
    match column.dtype() {
        DataType::Date | DataType::Datetime(_, _) => {
            let days = column.cast(&DataType::Date)?.cast(&DataType::Int32)?;
            days.i32()?
                .into_iter()
                .map(|d| d.ok_or_else(missing).and_then(days_to_date))
                .collect()
        }
        DataType::String => column
            .str()?
            .into_iter()
            .map(|d| d.ok_or_else(missing).and_then(parse_date))
            .collect(),
        other => Err(ForecastError::AlignmentError(format!(
            "Column '{}' must hold dates, found {}",
            DATES_COLUMN, other
        ))),
    }
}

/// Wide form of one metric: sorted date rows, unique id columns.
#[derive(Debug, Clone)]
pub struct Matrix {
    dates: Vec<NaiveDate>,
    ids: Vec<String>,
    values: Array2<f64>,
}

impl Matrix {
    /// Create a matrix, checking shape, date order and id uniqueness
    pub fn new(dates: Vec<NaiveDate>, ids: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.dim() != (dates.len(), ids.len()) {
            return Err(ForecastError::ValidationError(format!(
                "Matrix values have shape {:?}, expected ({}, {})",
                values.dim(),
                dates.len(),
                ids.len()
            )));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ForecastError::ValidationError(
                "Matrix dates must be strictly increasing".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(dup) = ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(ForecastError::ValidationError(format!(
                "Matrix has duplicate column '{}'",
                dup
            )));
        }
        Ok(Self { dates, ids, values })
    }

    /// Matrix of gaps over the given dates and ids
    pub fn missing(dates: Vec<NaiveDate>, ids: Vec<String>) -> Result<Self> {
        let values = Array2::from_elem((dates.len(), ids.len()), f64::NAN);
        Self::new(dates, ids, values)
    }

    /// Matrix built column by column; each column must match `dates`.
    pub fn from_columns(dates: Vec<NaiveDate>, columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let mut values = Array2::from_elem((dates.len(), columns.len()), f64::NAN);
        let mut ids = Vec::with_capacity(columns.len());
        for (j, (id, column)) in columns.into_iter().enumerate() {
            if column.len() != dates.len() {
                return Err(ForecastError::ValidationError(format!(
                    "Column '{}' has {} rows, expected {}",
                    id,
                    column.len(),
                    dates.len()
                )));
            }
            for (i, v) in column.into_iter().enumerate() {
                values[[i, j]] = v;
            }
            ids.push(id);
        }
        Self::new(dates, ids, values)
    }

    /// Assemble a matrix whose invariants the caller already guarantees
    pub(crate) fn from_parts(dates: Vec<NaiveDate>, ids: Vec<String>, values: Array2<f64>) -> Matrix {
        debug_assert_eq!(values.dim(), (dates.len(), ids.len()));
        Matrix { dates, ids, values }
    }

    /// Same dates and ids with new values of identical shape
    pub(crate) fn with_values(&self, values: Array2<f64>) -> Matrix {
        debug_assert_eq!(values.dim(), self.values.dim());
        Matrix {
            dates: self.dates.clone(),
            ids: self.ids.clone(),
            values,
        }
    }

    /// Get the row dates
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Get the column ids
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Get the values, rows by dates and columns by ids
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of date rows
    pub fn nrows(&self) -> usize {
        self.dates.len()
    }

    /// Number of id columns
    pub fn ncols(&self) -> usize {
        self.ids.len()
    }

    /// Check if the matrix has no cells
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Position of each id
    pub fn id_positions(&self) -> HashMap<&str, usize> {
        self.ids
            .iter()
            .enumerate()
            .map(|(j, id)| (id.as_str(), j))
            .collect()
    }

    /// Column position of `id`
    pub fn column_index(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|c| c == id)
    }

    /// Row position of `date`
    pub fn row_index(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// Observed value at `(date, id)`
    pub fn get(&self, date: NaiveDate, id: &str) -> Option<f64> {
        let i = self.row_index(date)?;
        let j = self.column_index(id)?;
        let v = self.values[[i, j]];
        if v.is_nan() {
            None
        } else {
            Some(v)
        }
    }

    /// Column of `id`
    pub fn column(&self, id: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(id)
            .map(|j| self.values.index_axis(Axis(1), j))
    }

    /// Number of gaps
    pub fn count_missing(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }

    /// Restrict or pad columns to `ids` in that order; absent ids become gap
    /// columns.
    pub fn with_columns(&self, ids: &[String]) -> Matrix {
        let positions = self.id_positions();
        let mut values = Array2::from_elem((self.nrows(), ids.len()), f64::NAN);
        for (j, id) in ids.iter().enumerate() {
            if let Some(&src) = positions.get(id.as_str()) {
                values
                    .index_axis_mut(Axis(1), j)
                    .assign(&self.values.index_axis(Axis(1), src));
            }
        }
        Matrix {
            dates: self.dates.clone(),
            ids: ids.to_vec(),
            values,
        }
    }

    /// Rows aligned to `grid`; dates absent from the matrix become gap rows
    /// and dates absent from the grid are dropped.
    pub fn reindex_dates(&self, grid: &[NaiveDate]) -> Matrix {
        let mut values = Array2::from_elem((grid.len(), self.ncols()), f64::NAN);
        for (i, date) in grid.iter().enumerate() {
            if let Some(src) = self.row_index(*date) {
                values
                    .index_axis_mut(Axis(0), i)
                    .assign(&self.values.index_axis(Axis(0), src));
            }
        }
        Matrix {
            dates: grid.to_vec(),
            ids: self.ids.clone(),
            values,
        }
    }

    /// Rows aligned to `grid`, each taking the latest row dated on or before
    /// it. Grid dates before the first row are gap rows.
    pub fn reindex_asof(&self, grid: &[NaiveDate]) -> Matrix {
        let mut values = Array2::from_elem((grid.len(), self.ncols()), f64::NAN);
        for (i, date) in grid.iter().enumerate() {
            let src = match self.dates.binary_search(date) {
                Ok(pos) => Some(pos),
                Err(0) => None,
                Err(pos) => Some(pos - 1),
            };
            if let Some(src) = src {
                values
                    .index_axis_mut(Axis(0), i)
                    .assign(&self.values.index_axis(Axis(0), src));
            }
        }
        Matrix {
            dates: grid.to_vec(),
            ids: self.ids.clone(),
            values,
        }
    }

    /// Apply a series transform to every column
    pub fn map_columns<F>(&self, f: F) -> Result<Matrix>
    where
        F: Fn(&[f64]) -> Result<Vec<f64>>,
    {
        let mut values = self.values.clone();
        for mut column in values.axis_iter_mut(Axis(1)) {
            let series: Vec<f64> = column.iter().copied().collect();
            let out = f(&series)?;
            if out.len() != series.len() {
                return Err(ForecastError::ValidationError(format!(
                    "Column transform returned {} rows, expected {}",
                    out.len(),
                    series.len()
                )));
            }
            for (cell, v) in column.iter_mut().zip(out) {
                *cell = v;
            }
        }
        Ok(Matrix {
            dates: self.dates.clone(),
            ids: self.ids.clone(),
            values,
        })
    }

    /// Apply a cross-sectional transform to every date row
    pub fn map_rows<F>(&self, f: F) -> Matrix
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        let mut values = self.values.clone();
        for mut row in values.axis_iter_mut(Axis(0)) {
            let cross_section: Vec<f64> = row.iter().copied().collect();
            for (cell, v) in row.iter_mut().zip(f(&cross_section)) {
                *cell = v;
            }
        }
        Matrix {
            dates: self.dates.clone(),
            ids: self.ids.clone(),
            values,
        }
    }

    /// Apply a cell-wise transform
    pub fn map<F>(&self, f: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            dates: self.dates.clone(),
            ids: self.ids.clone(),
            values: self.values.mapv(f),
        }
    }

    fn apply_columns<F>(&self, f: F) -> Matrix
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        let mut values = self.values.clone();
        for mut column in values.axis_iter_mut(Axis(1)) {
            let series: Vec<f64> = column.iter().copied().collect();
            for (cell, v) in column.iter_mut().zip(f(&series)) {
                *cell = v;
            }
        }
        Matrix {
            dates: self.dates.clone(),
            ids: self.ids.clone(),
            values,
        }
    }

    /// Difference with the row `lag` positions earlier
    pub fn diff(&self, lag: usize) -> Matrix {
        self.apply_columns(|s| series_math::diff(s, lag))
    }

    /// Shift rows by `periods`; positive lags, negative leads
    pub fn shift(&self, periods: isize) -> Matrix {
        self.apply_columns(|s| series_math::shift(s, periods))
    }

    /// Rolling mean over `window` rows requiring `min_periods` observations
    pub fn rolling_mean(&self, window: usize, min_periods: usize) -> Result<Matrix> {
        self.map_columns(|s| Ok(series_math::rolling_mean(s, window, min_periods)?))
    }

    /// Carry observations forward along time
    pub fn forward_fill(&self) -> Matrix {
        self.apply_columns(|s| {
            let mut out = s.to_vec();
            series_math::forward_fill(&mut out);
            out
        })
    }

    /// Raise observed values below `lower`; gaps stay gaps
    pub fn clip_lower(&self, lower: f64) -> Matrix {
        let mut out = self.clone();
        if let Some(cells) = out.values.as_slice_mut() {
            series_math::clip_lower(cells, lower);
        } else {
            out.values
                .mapv_inplace(|v| if !v.is_nan() && v < lower { lower } else { v });
        }
        out
    }

    /// Replace every gap with `value`
    pub fn fill_missing_value(&self, value: f64) -> Matrix {
        self.map(|v| if v.is_nan() { value } else { v })
    }

    /// Fill gaps from `other`, aligned on date and id. Cells of `other`
    /// outside this matrix are ignored.
    pub fn fill_missing_from(&self, other: &Matrix) -> Result<Matrix> {
        let fallback = other.with_columns(&self.ids).reindex_dates(&self.dates);
        let mut values = self.values.clone();
        for (mut column, source) in values
            .axis_iter_mut(Axis(1))
            .zip(fallback.values.axis_iter(Axis(1)))
        {
            let mut series: Vec<f64> = column.iter().copied().collect();
            let source: Vec<f64> = source.iter().copied().collect();
            series_math::fill_missing(&mut series, &source)?;
            column.assign(&Array1::from(series));
        }
        Ok(self.with_values(values))
    }
}

/// Long to wide. Rows are the sorted distinct dates, columns the sorted
/// distinct ids. When a `(date, id)` pair repeats, the last row wins: later
/// rows are treated as revisions of earlier ones.
pub fn to_matrix(panel: &Panel) -> Matrix {
    let dates: Vec<NaiveDate> = panel
        .rows
        .iter()
        .map(|r| r.date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let ids: Vec<String> = panel
        .rows
        .iter()
        .map(|r| r.id.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();

    let row_of: HashMap<NaiveDate, usize> =
        dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
    let col_of: HashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(j, id)| (id.as_str(), j))
        .collect();

    let mut values = Array2::from_elem((dates.len(), ids.len()), f64::NAN);
    for row in &panel.rows {
        let i = row_of[&row.date];
        let j = col_of[row.id.as_str()];
        values[[i, j]] = row.value.unwrap_or(f64::NAN);
    }

    Matrix { dates, ids, values }
}

/// Wide to long. Cells are emitted date by date, columns in matrix order.
/// Gaps are kept as `None` rows unless `dropna` is set.
pub fn to_panel(matrix: &Matrix, name: &str, dropna: bool) -> Panel {
    let mut rows = Vec::with_capacity(matrix.values.len());
    for (i, date) in matrix.dates.iter().enumerate() {
        for (j, id) in matrix.ids.iter().enumerate() {
            let v = matrix.values[[i, j]];
            if v.is_nan() {
                if !dropna {
                    rows.push(PanelRow::new(*date, id.clone(), None));
                }
            } else {
                rows.push(PanelRow::new(*date, id.clone(), Some(v)));
            }
        }
    }
    Panel::new(name, rows)
}

/// Wide matrix straight to a long `dates,id,<name>` frame
pub fn to_dataframe(matrix: &Matrix, name: &str, dropna: bool) -> Result<DataFrame> {
    to_panel(matrix, name, dropna).to_dataframe()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn d(text: &str) -> NaiveDate {
        parse_date(text).unwrap()
    }

    #[test]
    fn test_matrix_rejects_duplicate_ids() {
        let result = Matrix::new(
            vec![d("2020-03-07")],
            vec!["a".to_string(), "a".to_string()],
            array![[1.0, 2.0]],
        );
        assert!(matches!(result, Err(ForecastError::ValidationError(_))));
    }

    #[test]
    fn test_matrix_rejects_unsorted_dates() {
        let result = Matrix::new(
            vec![d("2020-03-14"), d("2020-03-07")],
            vec!["a".to_string()],
            array![[1.0], [2.0]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_to_matrix_last_duplicate_wins() {
        let panel = Panel::from_records(
            "cases",
            vec![
                (d("2020-03-07"), "a", 1.0),
                (d("2020-03-07"), "a", 5.0),
                (d("2020-03-07"), "b", 2.0),
            ],
        );
        let m = to_matrix(&panel);
        assert_eq!(m.get(d("2020-03-07"), "a"), Some(5.0));
        assert_eq!(m.ncols(), 2);
    }

    #[test]
    fn test_reindex_asof_takes_latest_row() {
        let m = Matrix::new(
            vec![d("2020-03-02"), d("2020-03-05")],
            vec!["a".to_string()],
            array![[1.0], [2.0]],
        )
        .unwrap();
        let out = m.reindex_asof(&[d("2020-03-01"), d("2020-03-04"), d("2020-03-07")]);
        assert!(out.values()[[0, 0]].is_nan());
        assert_eq!(out.values()[[1, 0]], 1.0);
        assert_eq!(out.values()[[2, 0]], 2.0);
    }

    #[test]
    fn test_fill_missing_from_aligns_on_labels() {
        let m = Matrix::new(
            vec![d("2020-03-07")],
            vec!["a".to_string(), "b".to_string()],
            array![[f64::NAN, 2.0]],
        )
        .unwrap();
        let fallback = Matrix::new(
            vec![d("2020-03-07")],
            vec!["b".to_string(), "a".to_string()],
            array![[20.0, 10.0]],
        )
        .unwrap();
        let out = m.fill_missing_from(&fallback).unwrap();
        assert_eq!(out.get(d("2020-03-07"), "a"), Some(10.0));
        assert_eq!(out.get(d("2020-03-07"), "b"), Some(2.0));
    }

    #[test]
    fn test_fill_missing_from_keeps_gaps_without_source() {
        let m = Matrix::missing(
            vec![d("2020-03-07"), d("2020-03-14")],
            vec!["a".to_string(), "b".to_string()],
        )
        .unwrap();
        let fallback = Matrix::new(
            vec![d("2020-03-14")],
            vec!["a".to_string(), "z".to_string()],
            array![[5.0, 9.0]],
        )
        .unwrap();
        let out = m.fill_missing_from(&fallback).unwrap();
        assert_eq!(out.ids(), m.ids());
        assert_eq!(out.get(d("2020-03-14"), "a"), Some(5.0));
        assert_eq!(out.get(d("2020-03-07"), "a"), None);
        assert_eq!(out.get(d("2020-03-14"), "b"), None);
    }
}
