//! SQLite persistence shared by both services.
//!
//! The schema is created idempotently at startup. Row models read columns
//! in a fixed order, and the completion-log adapter feeds the habit
//! calculators straight from `habit_logs`.

pub mod habit_log;
pub mod models;
pub mod schema;

pub use habit_log::{record_completion, SqliteCompletionLog};
pub use models::{
    CalendarEvent, Expense, Habit, HabitLog, JournalEntry, Location, Member, StoredJournalEntry,
    Task, User,
};
pub use schema::{open_connection, open_in_memory, Schema};
