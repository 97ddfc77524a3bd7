//! Calendar helpers shared by the month and range views.

use crate::{DashboardError, Result};
use chrono::{Datelike, NaiveDate};

/// First and last day of a month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| DashboardError::InvalidInput(format!("Invalid month: {}-{}", year, month)))?;

    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last = next_first
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| DashboardError::InvalidInput(format!("Invalid month: {}-{}", year, month)))?;

    Ok((first, last))
}

/// Every day from `start` to `end` inclusive.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// Display colour for a task priority.
pub fn priority_color(priority: &str) -> &'static str {
    match priority {
        "high" => "#EF4444",
        "medium" => "#F59E0B",
        "low" => "#10B981",
        _ => "#6B7280",
    }
}

/// (year, month) of a date, for defaulting query parameters.
pub fn year_month(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}
