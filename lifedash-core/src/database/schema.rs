//! Database schema and connection setup.

use crate::Result;
use rusqlite::Connection;
use std::path::Path;

/// Which service's tables a connection carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Users, tasks, habits, expenses, journal and calendar.
    Dashboard,
    /// Members, locations and verification tokens.
    Membership,
}

impl Schema {
    /// Create every table and index for this schema. Idempotent.
    pub fn initialize(self, conn: &Connection) -> Result<()> {
        match self {
            Self::Dashboard => {
                create_users_table(conn)?;
                create_tasks_table(conn)?;
                create_habit_tables(conn)?;
                create_expenses_table(conn)?;
                create_journal_table(conn)?;
                create_calendar_table(conn)?;
                create_dashboard_indexes(conn)?;
            }
            Self::Membership => {
                create_membership_tables(conn)?;
            }
        }
        Ok(())
    }
}

/// Open a database file with foreign keys and WAL enabled.
pub fn open_connection<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    Ok(conn)
}

/// Create a new in-memory database for testing
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

fn create_users_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            first_name TEXT,
            last_name TEXT,
            age INTEGER,
            budget REAL NOT NULL DEFAULT 5000.0,
            theme_preference TEXT NOT NULL DEFAULT 'dark',
            current_streak INTEGER NOT NULL DEFAULT 0,
            longest_streak INTEGER NOT NULL DEFAULT 0,
            last_login TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

fn create_tasks_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            priority TEXT NOT NULL DEFAULT 'medium',
            status TEXT NOT NULL DEFAULT 'pending',
            category TEXT,
            due_date TEXT,
            completed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
        [],
    )?;
    Ok(())
}

fn create_habit_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS habits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            frequency TEXT NOT NULL DEFAULT 'daily',
            target_days INTEGER NOT NULL DEFAULT 7,
            color TEXT NOT NULL DEFAULT '#3B82F6',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS habit_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            habit_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 1,
            notes TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (habit_id, date),
            FOREIGN KEY (habit_id) REFERENCES habits(id) ON DELETE CASCADE
        );",
    )?;
    Ok(())
}

fn create_expenses_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            amount REAL NOT NULL,
            category TEXT NOT NULL,
            description TEXT,
            date TEXT NOT NULL,
            payment_method TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
        [],
    )?;
    Ok(())
}

fn create_journal_table(conn: &Connection) -> Result<()> {
    // title and content hold cipher tokens (or legacy plain text).
    conn.execute(
        "CREATE TABLE IF NOT EXISTS journal_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            title TEXT,
            content TEXT NOT NULL,
            mood TEXT,
            tags TEXT,
            date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
        [],
    )?;
    Ok(())
}

fn create_calendar_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS calendar_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            event_type TEXT,
            location TEXT,
            priority TEXT NOT NULL DEFAULT 'medium',
            color TEXT NOT NULL DEFAULT '#1a1a1a',
            reminder INTEGER NOT NULL DEFAULT 0,
            related_id INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
        [],
    )?;
    Ok(())
}

fn create_dashboard_indexes(conn: &Connection) -> Result<()> {
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_tasks_user_id ON tasks(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_habits_user_id ON habits(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_habit_logs_habit_date ON habit_logs(habit_id, date)",
        "CREATE INDEX IF NOT EXISTS idx_expenses_user_date ON expenses(user_id, date)",
        "CREATE INDEX IF NOT EXISTS idx_journal_user_date ON journal_entries(user_id, date)",
        "CREATE INDEX IF NOT EXISTS idx_calendar_user_start
         ON calendar_events(user_id, start_time)",
    ];
    for sql in &indexes {
        conn.execute(sql, [])?;
    }
    Ok(())
}

fn create_membership_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS locations (
            location_id INTEGER PRIMARY KEY AUTOINCREMENT,
            country TEXT NOT NULL,
            state TEXT,
            city TEXT,
            country_code TEXT,
            time_zone TEXT
        );

        CREATE TABLE IF NOT EXISTS members (
            email TEXT PRIMARY KEY,
            role TEXT NOT NULL DEFAULT 'member',
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            phone_number TEXT UNIQUE,
            location_id INTEGER,
            phone_verified INTEGER NOT NULL DEFAULT 0,
            email_verified INTEGER NOT NULL DEFAULT 0,
            password_hash TEXT NOT NULL,
            profile_image_url TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (location_id) REFERENCES locations(location_id)
        );

        CREATE TABLE IF NOT EXISTS tokens (
            token TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            token_type TEXT NOT NULL,
            code TEXT,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            is_used INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (email) REFERENCES members(email) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_tokens_email_type ON tokens(email, token_type);
        CREATE INDEX IF NOT EXISTS idx_tokens_expires ON tokens(expires_at);",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(conn: &Connection, kind: &str) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type = ?1")
            .unwrap()
            .query_map([kind], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_dashboard_schema() {
        let conn = open_in_memory().unwrap();
        Schema::Dashboard.initialize(&conn).unwrap();
        // Second run must be a no-op.
        Schema::Dashboard.initialize(&conn).unwrap();

        let tables = names(&conn, "table");
        for table in [
            "users",
            "tasks",
            "habits",
            "habit_logs",
            "expenses",
            "journal_entries",
            "calendar_events",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
        assert!(!tables.contains(&"members".to_string()));

        let indexes = names(&conn, "index");
        assert!(indexes.contains(&"idx_habit_logs_habit_date".to_string()));
    }

    #[test]
    fn test_membership_schema() {
        let conn = open_in_memory().unwrap();
        Schema::Membership.initialize(&conn).unwrap();

        let tables = names(&conn, "table");
        for table in ["members", "locations", "tokens"] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
        assert!(!tables.contains(&"habits".to_string()));
    }

    #[test]
    fn test_habit_log_unique_per_day() {
        let conn = open_in_memory().unwrap();
        Schema::Dashboard.initialize(&conn).unwrap();

        conn.execute(
            "INSERT INTO users (email, password_hash, created_at, updated_at)
             VALUES ('a@example.com', 'x', '2024-01-01', '2024-01-01')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO habits (user_id, name, created_at, updated_at)
             VALUES (1, 'Read', '2024-01-01', '2024-01-01')",
            [],
        )
        .unwrap();

        let insert = "INSERT INTO habit_logs (habit_id, date, completed, created_at)
                      VALUES (1, '2024-01-02', 1, '2024-01-02')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }

    #[test]
    fn test_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.db");

        {
            let conn = open_connection(&path).unwrap();
            Schema::Dashboard.initialize(&conn).unwrap();
        }

        let conn = open_connection(&path).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'users'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
