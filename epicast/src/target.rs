//! Forecast target: weekly new cases per 100k residents

use crate::error::Result;
use crate::locations::Locations;
use crate::panel::{to_matrix, Matrix, Panel};
use crate::transforms::normalize_cases;
use crate::utils::{daily_grid, weekly_grid};
use chrono::NaiveDate;
use log::info;

/// Weekly incident cases per 100k from a cumulative case panel.
///
/// Decreases of the cumulative count are data corrections and yield zero
/// incidence, never a negative one.
pub fn incident_cases(
    cumulative: &Panel,
    start: NaiveDate,
    today: NaiveDate,
    locations: &Locations,
) -> Result<Matrix> {
    let all_dates = daily_grid(start, today)?;
    let dates = weekly_grid(start, today)?;
    let weekly = to_matrix(cumulative)
        .reindex_dates(&all_dates)
        .reindex_dates(&dates);
    Ok(normalize_cases(&weekly.diff(1).clip_lower(0.0), locations))
}

/// Target for a `weeks_ahead` horizon: the value at week `t` is the
/// incidence observed at week `t + weeks_ahead`.
pub fn build_target(
    cumulative: &Panel,
    start: NaiveDate,
    today: NaiveDate,
    weeks_ahead: usize,
    locations: &Locations,
) -> Result<Matrix> {
    info!("Creating {} wk ahead target", weeks_ahead);
    let incidence = incident_cases(cumulative, start, today, locations)?;
    Ok(incidence.shift(-(weeks_ahead as isize)))
}

/// Historical weekly incidence per 100k for export. Each week takes the
/// latest cumulative report on or before it; corrections are kept as-is.
pub fn incidence_history(
    cumulative: &Panel,
    start: NaiveDate,
    today: NaiveDate,
    locations: &Locations,
) -> Result<Matrix> {
    let dates = weekly_grid(start, today)?;
    let weekly = to_matrix(cumulative).reindex_asof(&dates);
    Ok(normalize_cases(&weekly.diff(1), locations))
}
