//! Request handlers and the parsing helpers they share.

pub mod auth;
pub mod calendar;
pub mod expenses;
pub mod habits;
pub mod journal;
pub mod members;
pub mod tasks;

use crate::error::ApiError;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use lifedash_core::crypto::{hash_password, verify_password};
use serde::{Deserialize, Deserializer};

/// The server's local calendar day.
pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parse an ISO date. A datetime is accepted and truncated to its day.
pub(crate) fn parse_date(value: &str, field: &str) -> Result<NaiveDate, ApiError> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| parse_datetime(value, field).map(|dt| dt.date()))
        .map_err(|_| ApiError::BadRequest(format!("Invalid {}: {}", field, value)))
}

/// Parse an ISO datetime. Offsets are dropped and a bare date means midnight.
pub(crate) fn parse_datetime(value: &str, field: &str) -> Result<NaiveDateTime, ApiError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_local());
    }

    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid {}: {}", field, value)))
}

pub(crate) fn parse_optional_date(
    value: Option<&str>,
    field: &str,
) -> Result<Option<NaiveDate>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_date(v, field).map(Some),
        None => Ok(None),
    }
}

/// A non-blank string, or a 400 with `message`.
pub(crate) fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(message.to_string()))
}

/// Hash a password on the blocking pool. Never call while holding a
/// storage guard.
pub(crate) async fn hash_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Verify a password on the blocking pool. Never call while holding a
/// storage guard.
pub(crate) async fn verify_blocking(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("Password check task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Distinguish an absent field from an explicit `null` in update bodies.
///
/// Use with `#[serde(default, deserialize_with = "nullable")]`: absent gives
/// `None`, `null` gives `Some(None)`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
