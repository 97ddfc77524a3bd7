//! Life Dashboard Core Library
//!
//! Logic shared by the dashboard API and the membership service: habit
//! statistics, at-rest encryption of journal text, password hashing,
//! verification tokens and the SQLite schema.

pub mod calendar;
pub mod crypto;
pub mod database;
pub mod habits;
pub mod login_streak;
pub mod tokens;

pub use crypto::{ContentCipher, CryptoError, Decryption};
pub use habits::{completion_rate, current_streak, CompletionLog, HabitCompletion};
pub use login_streak::LoginStreak;
pub use tokens::{TokenKind, TokenService};

use thiserror::Error;

/// Result type for dashboard operations
pub type Result<T> = std::result::Result<T, DashboardError>;

/// General error type for dashboard operations
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
