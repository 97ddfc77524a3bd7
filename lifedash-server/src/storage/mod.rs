//! SQLite storage shared across request handlers.

use crate::error::ApiError;
use lifedash_core::database::{open_connection, open_in_memory, Schema};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Thread-safe handle to one service's database.
#[derive(Clone)]
pub struct Storage {
    conn: Arc<Mutex<Connection>>,
}

impl Storage {
    pub fn open(path: &Path, schema: Schema) -> anyhow::Result<Self> {
        let conn = open_connection(path)?;
        schema.initialize(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn in_memory(schema: Schema) -> anyhow::Result<Self> {
        let conn = open_in_memory()?;
        schema.initialize(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.conn
            .lock()
            .map_err(|e| ApiError::Internal(format!("Lock error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("members.db");

        let storage = Storage::open(&path, Schema::Membership).unwrap();
        let conn = storage.conn().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM members", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_clones_share_connection() {
        let storage = Storage::in_memory(Schema::Dashboard).unwrap();
        let clone = storage.clone();

        storage
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO users (email, password_hash, created_at, updated_at)
                 VALUES ('a@example.com', 'x', 'now', 'now')",
                [],
            )
            .unwrap();

        let count: i64 = clone
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
