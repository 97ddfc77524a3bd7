//! Habit statistics derived from the completion log.
//!
//! The calculators are free functions over a [`CompletionLog`], so they run
//! the same against SQLite or an in-memory map.

pub mod rate;
pub mod streak;

pub use rate::{completion_rate, COMPLETION_WINDOW_DAYS};
pub use streak::{current_streak, STREAK_CAP};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Allowed values for a habit's frequency.
pub const FREQUENCY_OPTIONS: [&str; 4] = ["daily", "weekly", "weekdays", "weekends"];

/// Default colour for a new habit.
pub const DEFAULT_HABIT_COLOR: &str = "#3B82F6";

/// One (habit, day) record. At most one exists per pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitCompletion {
    pub habit_id: i64,
    pub date: NaiveDate,
    pub completed: bool,
    pub notes: Option<String>,
}

/// Read access to the habit completion log.
pub trait CompletionLog {
    type Error;

    /// Point lookup by (habit, day).
    fn find_completion(
        &self,
        habit_id: i64,
        date: NaiveDate,
    ) -> Result<Option<HabitCompletion>, Self::Error>;

    /// Count records with `completed = true` whose date lies in `from..=to`.
    fn count_completed(
        &self,
        habit_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<u32, Self::Error>;
}

#[cfg(test)]
pub(crate) mod memory {
    use super::{CompletionLog, HabitCompletion};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::convert::Infallible;

    /// Map-backed completion log for tests.
    #[derive(Default)]
    pub struct MemoryLog {
        records: BTreeMap<(i64, NaiveDate), bool>,
    }

    impl MemoryLog {
        pub fn mark(&mut self, habit_id: i64, date: NaiveDate, completed: bool) {
            self.records.insert((habit_id, date), completed);
        }
    }

    impl CompletionLog for MemoryLog {
        type Error = Infallible;

        fn find_completion(
            &self,
            habit_id: i64,
            date: NaiveDate,
        ) -> Result<Option<HabitCompletion>, Infallible> {
            Ok(self
                .records
                .get(&(habit_id, date))
                .map(|&completed| HabitCompletion {
                    habit_id,
                    date,
                    completed,
                    notes: None,
                }))
        }

        fn count_completed(
            &self,
            habit_id: i64,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<u32, Infallible> {
            Ok(self
                .records
                .range((habit_id, from)..=(habit_id, to))
                .filter(|(_, completed)| **completed)
                .count() as u32)
        }
    }
}
