//! Row models for both schemas.
//!
//! Each model lists its columns in `COLUMNS`, in the order `from_row` reads
//! them, so queries stay in step with the struct.

use crate::crypto::ContentCipher;
use crate::login_streak::LoginStreak;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::Row;
use serde::Serialize;

/// A dashboard account
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i64>,
    pub budget: f64,
    pub theme_preference: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_login: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub const COLUMNS: &'static str = "id, email, password_hash, first_name, last_name, age, \
         budget, theme_preference, current_streak, longest_streak, last_login, created_at, \
         updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
            age: row.get(5)?,
            budget: row.get(6)?,
            theme_preference: row.get(7)?,
            current_streak: row.get(8)?,
            longest_streak: row.get(9)?,
            last_login: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    pub fn login_streak(&self) -> LoginStreak {
        LoginStreak {
            current: self.current_streak,
            longest: self.longest_streak,
            last_login: self.last_login,
        }
    }
}

/// A to-do item
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub status: String,
    pub category: Option<String>,
    pub due_date: Option<NaiveDateTime>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub const COLUMNS: &'static str = "id, user_id, title, description, priority, status, \
         category, due_date, completed_at, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            priority: row.get(4)?,
            status: row.get(5)?,
            category: row.get(6)?,
            due_date: row.get(7)?,
            completed_at: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

/// A tracked habit
#[derive(Debug, Clone, Serialize)]
pub struct Habit {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub frequency: String,
    pub target_days: i64,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Habit {
    pub const COLUMNS: &'static str =
        "id, user_id, name, description, frequency, target_days, color, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            frequency: row.get(4)?,
            target_days: row.get(5)?,
            color: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

/// One day's entry in a habit's completion log
#[derive(Debug, Clone, Serialize)]
pub struct HabitLog {
    pub id: i64,
    pub habit_id: i64,
    pub date: NaiveDate,
    pub completed: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HabitLog {
    pub const COLUMNS: &'static str = "id, habit_id, date, completed, notes, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            habit_id: row.get(1)?,
            date: row.get(2)?,
            completed: row.get(3)?,
            notes: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Expense {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    pub const COLUMNS: &'static str = "id, user_id, amount, category, description, date, \
         payment_method, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            amount: row.get(2)?,
            category: row.get(3)?,
            description: row.get(4)?,
            date: row.get(5)?,
            payment_method: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

/// A journal row as stored: `title` and `content` are cipher tokens, or
/// plain text for rows written before encryption.
#[derive(Debug, Clone)]
pub struct StoredJournalEntry {
    pub id: i64,
    pub user_id: i64,
    pub title: Option<String>,
    pub content: String,
    pub mood: Option<String>,
    pub tags: Option<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A journal entry as returned to its owner.
#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub id: i64,
    pub title: Option<String>,
    pub content: String,
    pub mood: Option<String>,
    pub tags: Vec<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredJournalEntry {
    pub const COLUMNS: &'static str =
        "id, user_id, title, content, mood, tags, date, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            mood: row.get(4)?,
            tags: row.get(5)?,
            date: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    /// Decrypt title and content and split the tag list.
    pub fn decrypt(self, cipher: &ContentCipher) -> JournalEntry {
        JournalEntry {
            id: self.id,
            title: cipher.decrypt(self.title.as_deref()),
            content: cipher.decrypt(Some(&self.content)).unwrap_or_default(),
            mood: self.mood,
            tags: split_tags(self.tags.as_deref()),
            date: self.date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Tags are stored comma-joined.
pub fn join_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn split_tags(tags: Option<&str>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarEvent {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub event_type: Option<String>,
    pub location: Option<String>,
    pub priority: String,
    pub color: String,
    pub reminder: bool,
    pub related_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarEvent {
    pub const COLUMNS: &'static str = "id, user_id, title, description, start_time, end_time, \
         event_type, location, priority, color, reminder, related_id, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            start_time: row.get(4)?,
            end_time: row.get(5)?,
            event_type: row.get(6)?,
            location: row.get(7)?,
            priority: row.get(8)?,
            color: row.get(9)?,
            reminder: row.get(10)?,
            related_id: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

/// A membership-service account, keyed by email
#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub email: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    #[serde(skip_serializing)]
    pub location_id: Option<i64>,
    pub phone_verified: bool,
    pub email_verified: bool,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Member {
    pub const COLUMNS: &'static str = "email, role, first_name, last_name, phone_number, \
         location_id, phone_verified, email_verified, password_hash, profile_image_url, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            email: row.get(0)?,
            role: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            phone_number: row.get(4)?,
            location_id: row.get(5)?,
            phone_verified: row.get(6)?,
            email_verified: row.get(7)?,
            password_hash: row.get(8)?,
            profile_image_url: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    #[serde(skip_serializing)]
    pub location_id: i64,
    pub country: String,
    pub state: Option<String>,
    pub city: Option<String>,
    pub country_code: Option<String>,
    pub time_zone: Option<String>,
}

impl Location {
    pub const COLUMNS: &'static str = "location_id, country, state, city, country_code, time_zone";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            location_id: row.get(0)?,
            country: row.get(1)?,
            state: row.get(2)?,
            city: row.get(3)?,
            country_code: row.get(4)?,
            time_zone: row.get(5)?,
        })
    }
}
