//! `habit_logs` as a [`CompletionLog`].

use crate::habits::{CompletionLog, HabitCompletion};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Completion log backed by the `habit_logs` table.
pub struct SqliteCompletionLog<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCompletionLog<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl CompletionLog for SqliteCompletionLog<'_> {
    type Error = rusqlite::Error;

    fn find_completion(
        &self,
        habit_id: i64,
        date: NaiveDate,
    ) -> Result<Option<HabitCompletion>, Self::Error> {
        self.conn
            .query_row(
                "SELECT habit_id, date, completed, notes FROM habit_logs
                 WHERE habit_id = ?1 AND date = ?2",
                params![habit_id, date],
                |row| {
                    Ok(HabitCompletion {
                        habit_id: row.get(0)?,
                        date: row.get(1)?,
                        completed: row.get(2)?,
                        notes: row.get(3)?,
                    })
                },
            )
            .optional()
    }

    fn count_completed(
        &self,
        habit_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<u32, Self::Error> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM habit_logs
             WHERE habit_id = ?1 AND completed = 1 AND date BETWEEN ?2 AND ?3",
            params![habit_id, from, to],
            |row| row.get(0),
        )
    }
}

/// Insert or replace the record for `(habit_id, date)`.
pub fn record_completion(conn: &Connection, completion: &HabitCompletion) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO habit_logs (habit_id, date, completed, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (habit_id, date)
         DO UPDATE SET completed = excluded.completed, notes = excluded.notes",
        params![
            completion.habit_id,
            completion.date,
            completion.completed,
            completion.notes,
            Utc::now()
        ],
    )?;
    Ok(())
}
