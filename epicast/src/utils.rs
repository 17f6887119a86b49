//! Calendar helpers for the daily and weekly date grids

use crate::error::{ForecastError, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Weekday that closes an epidemiological week.
pub const WEEK_ANCHOR: Weekday = Weekday::Sat;

/// Parse an ISO `YYYY-MM-DD` date
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")?)
}

/// Every day in `[start, end]`.
pub fn daily_grid(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
    if end < start {
        return Err(ForecastError::ValidationError(format!(
            "Grid end {} precedes start {}",
            end, start
        )));
    }
    Ok(start.iter_days().take_while(|d| *d <= end).collect())
}

/// Every week-closing Saturday in `[start, end]`.
pub fn weekly_grid(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
    if end < start {
        return Err(ForecastError::ValidationError(format!(
            "Grid end {} precedes start {}",
            end, start
        )));
    }
    let first = roll_forward(start);
    Ok(first
        .iter_weeks()
        .take_while(|d| *d <= end)
        .collect())
}

/// First week-closing day on or after `date`.
pub fn roll_forward(date: NaiveDate) -> NaiveDate {
    let ahead = (7 + WEEK_ANCHOR.num_days_from_monday() as i64
        - date.weekday().num_days_from_monday() as i64)
        % 7;
    date + Duration::days(ahead)
}

/// Week-closing date `weeks_ahead` weeks after the instance date.
///
/// An instance that is not itself a week-closing day first rolls forward to
/// the next one, which then counts as the first week.
pub fn target_end_date(instance: NaiveDate, weeks_ahead: usize) -> NaiveDate {
    let rolled = roll_forward(instance);
    let extra = if rolled == instance {
        weeks_ahead as i64
    } else {
        weeks_ahead as i64 - 1
    };
    rolled + Duration::weeks(extra.max(0))
}

/// Hub label for a horizon, e.g. `"2 wk ahead inc case"`.
pub fn horizon_label(weeks_ahead: usize) -> String {
    format!("{} wk ahead inc case", weeks_ahead)
}
