//! Current streak: consecutive completed days ending today.

use super::CompletionLog;
use chrono::NaiveDate;

/// Upper bound on the walk. Guards against runaway iteration on corrupted
/// data; it is not a product rule.
pub const STREAK_CAP: u32 = 365;

/// Count consecutive days, walking back from `today`, that have a record
/// marked completed.
///
/// A missing record and a record with `completed = false` both end the
/// walk, so a habit not done today has a streak of 0. Storage errors are
/// returned unchanged.
pub fn current_streak<L: CompletionLog>(
    log: &L,
    habit_id: i64,
    today: NaiveDate,
) -> Result<u32, L::Error> {
    let mut streak = 0;
    let mut day = today;

    while streak < STREAK_CAP {
        match log.find_completion(habit_id, day)? {
            Some(record) if record.completed => streak += 1,
            _ => break,
        }

        day = match day.pred_opt() {
            Some(previous) => previous,
            None => break,
        };
    }

    Ok(streak)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habits::memory::MemoryLog;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn test_no_records_is_zero() {
        let log = MemoryLog::default();
        assert_eq!(current_streak(&log, 1, today()).unwrap(), 0);
    }

    #[test]
    fn test_three_day_streak() {
        let mut log = MemoryLog::default();
        for offset in 0..3 {
            log.mark(1, today() - Duration::days(offset), true);
        }
        // today-4 completed but today-3 missing: not counted.
        log.mark(1, today() - Duration::days(4), true);

        assert_eq!(current_streak(&log, 1, today()).unwrap(), 3);
    }

    #[test]
    fn test_today_not_completed_is_zero() {
        let mut log = MemoryLog::default();
        log.mark(1, today(), false);
        for offset in 1..10 {
            log.mark(1, today() - Duration::days(offset), true);
        }

        assert_eq!(current_streak(&log, 1, today()).unwrap(), 0);
    }

    #[test]
    fn test_missing_today_does_not_skip() {
        let mut log = MemoryLog::default();
        for offset in 1..5 {
            log.mark(1, today() - Duration::days(offset), true);
        }

        assert_eq!(current_streak(&log, 1, today()).unwrap(), 0);
    }

    #[test]
    fn test_capped_at_365() {
        let mut log = MemoryLog::default();
        for offset in 0..400 {
            log.mark(1, today() - Duration::days(offset), true);
        }

        assert_eq!(current_streak(&log, 1, today()).unwrap(), STREAK_CAP);
    }

    #[test]
    fn test_exactly_365_days() {
        let mut log = MemoryLog::default();
        for offset in 0..365 {
            log.mark(1, today() - Duration::days(offset), true);
        }

        assert_eq!(current_streak(&log, 1, today()).unwrap(), 365);
    }

    #[test]
    fn test_other_habits_ignored() {
        let mut log = MemoryLog::default();
        log.mark(2, today(), true);
        log.mark(2, today() - Duration::days(1), true);
        log.mark(1, today(), true);

        assert_eq!(current_streak(&log, 1, today()).unwrap(), 1);
        assert_eq!(current_streak(&log, 2, today()).unwrap(), 2);
    }

    #[test]
    fn test_storage_error_propagates() {
        struct Broken;
        impl CompletionLog for Broken {
            type Error = &'static str;
            fn find_completion(
                &self,
                _: i64,
                _: NaiveDate,
            ) -> Result<Option<crate::habits::HabitCompletion>, &'static str> {
                Err("connection lost")
            }
            fn count_completed(
                &self,
                _: i64,
                _: NaiveDate,
                _: NaiveDate,
            ) -> Result<u32, &'static str> {
                Err("connection lost")
            }
        }

        assert_eq!(current_streak(&Broken, 1, today()), Err("connection lost"));
    }
}
