//! Rolling completion rate over a fixed trailing window.

use super::CompletionLog;
use chrono::{Duration, NaiveDate};

/// Window length and divisor. The divisor stays 30 even for habits younger
/// than the window, so new habits show a low rate until they age in.
pub const COMPLETION_WINDOW_DAYS: i64 = 30;

/// Percentage of the window marked completed, rounded to one decimal.
///
/// Counts completed records dated `today - 30 ..= today` and divides by 30.
/// The inclusive range covers 31 days, so the result is clamped to 100.
pub fn completion_rate<L: CompletionLog>(
    log: &L,
    habit_id: i64,
    today: NaiveDate,
) -> Result<f64, L::Error> {
    let start = today - Duration::days(COMPLETION_WINDOW_DAYS);
    let completed = log.count_completed(habit_id, start, today)?;

    let percent = f64::from(completed) / COMPLETION_WINDOW_DAYS as f64 * 100.0;
    let rounded = (percent * 10.0).round() / 10.0;

    Ok(rounded.clamp(0.0, 100.0))
}
