//! Journal handlers. Title and content are encrypted at rest.

use super::{nullable, parse_date, parse_optional_date, required, today};
use crate::auth::Subject;
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use lifedash_core::database::models::join_tags;
use lifedash_core::database::{JournalEntry, StoredJournalEntry};
use lifedash_core::{ContentCipher, Decryption};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct JournalFilter {
    pub search: Option<String>,
    pub mood: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateEntryRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub mood: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub date: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateEntryRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub title: Option<Option<String>>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub mood: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Option<Option<Vec<String>>>,
    pub date: Option<String>,
}

fn load_entry(
    conn: &Connection,
    user_id: i64,
    entry_id: i64,
) -> Result<StoredJournalEntry, ApiError> {
    conn.query_row(
        &format!(
            "SELECT {} FROM journal_entries WHERE id = ?1 AND user_id = ?2",
            StoredJournalEntry::COLUMNS
        ),
        params![entry_id, user_id],
        StoredJournalEntry::from_row,
    )
    .optional()?
    .ok_or_else(|| ApiError::NotFound("Journal entry not found".to_string()))
}

/// Encrypt required content. Callers reject empty content first.
fn seal(cipher: &ContentCipher, plaintext: &str) -> String {
    cipher.encrypt(Some(plaintext)).unwrap_or_default()
}

/// Bring a stored value into the current token format. Plain text and
/// readable Fernet tokens are resealed; current tokens and tokens this key
/// cannot open stay as they are.
fn reseal_legacy(cipher: &ContentCipher, stored: String) -> String {
    match cipher.open(&stored) {
        Decryption::LegacyPassthrough(plain) => seal(cipher, &plain),
        Decryption::New(plain) if !ContentCipher::is_current_token(&stored) => {
            seal(cipher, &plain)
        }
        _ => stored,
    }
}

fn matches_search(entry: &JournalEntry, needle: &str) -> bool {
    entry.content.to_lowercase().contains(needle)
        || entry
            .title
            .as_deref()
            .is_some_and(|t| t.to_lowercase().contains(needle))
}

pub async fn list_entries(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Query(filter): Query<JournalFilter>,
) -> Result<Json<Vec<JournalEntry>>, ApiError> {
    let user_id = subject.user_id()?;
    let start = parse_optional_date(filter.start_date.as_deref(), "start_date")?;
    let end = parse_optional_date(filter.end_date.as_deref(), "end_date")?;

    let mut sql = format!(
        "SELECT {} FROM journal_entries WHERE user_id = ?",
        StoredJournalEntry::COLUMNS
    );
    let mut args = vec![SqlValue::Integer(user_id)];
    if let Some(mood) = filter.mood.filter(|m| !m.is_empty()) {
        sql.push_str(" AND mood = ?");
        args.push(SqlValue::Text(mood));
    }
    if let Some(start) = start {
        sql.push_str(" AND date >= ?");
        args.push(SqlValue::Text(start.to_string()));
    }
    if let Some(end) = end {
        sql.push_str(" AND date <= ?");
        args.push(SqlValue::Text(end.to_string()));
    }
    sql.push_str(" ORDER BY date DESC, id DESC");

    let conn = state.storage.conn()?;
    let mut stmt = conn.prepare(&sql)?;
    let stored = stmt
        .query_map(params_from_iter(args), StoredJournalEntry::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    // Ciphertext cannot be matched in SQL, so search runs on decrypted rows.
    let needle = filter
        .search
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());
    let entries = stored
        .into_iter()
        .map(|row| row.decrypt(&state.cipher))
        .filter(|entry| needle.as_deref().map_or(true, |n| matches_search(entry, n)))
        .collect();

    Ok(Json(entries))
}

pub async fn create_entry(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(req): Json<CreateEntryRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user_id = subject.user_id()?;
    let content = required(req.content, "Content is required")?;
    let date = parse_optional_date(req.date.as_deref(), "date")?.unwrap_or_else(today);

    let title = state.cipher.encrypt(req.title.as_deref());
    let content = seal(&state.cipher, &content);
    let now = Utc::now();

    let conn = state.storage.conn()?;
    conn.execute(
        "INSERT INTO journal_entries (user_id, title, content, mood, tags, date, created_at,
                                      updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![user_id, title, content, req.mood, join_tags(&req.tags), date, now],
    )?;
    let entry = load_entry(&conn, user_id, conn.last_insert_rowid())?.decrypt(&state.cipher);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Journal entry created successfully", "entry": entry })),
    ))
}

pub async fn get_entry(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(entry_id): Path<i64>,
) -> Result<Json<JournalEntry>, ApiError> {
    let conn = state.storage.conn()?;
    let entry = load_entry(&conn, subject.user_id()?, entry_id)?;
    Ok(Json(entry.decrypt(&state.cipher)))
}

pub async fn update_entry(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(entry_id): Path<i64>,
    Json(req): Json<UpdateEntryRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = subject.user_id()?;
    let conn = state.storage.conn()?;
    let mut stored = load_entry(&conn, user_id, entry_id)?;

    // Rows written before encryption are sealed on their next update.
    stored.title = match req.title {
        Some(title) => state.cipher.encrypt(title.as_deref()),
        None => stored
            .title
            .filter(|t| !t.is_empty())
            .map(|t| reseal_legacy(&state.cipher, t)),
    };
    stored.content = match req.content {
        Some(content) => seal(&state.cipher, &required(Some(content), "Content cannot be empty")?),
        None => reseal_legacy(&state.cipher, stored.content),
    };

    if let Some(mood) = req.mood {
        stored.mood = mood;
    }
    if let Some(tags) = req.tags {
        stored.tags = Some(join_tags(&tags.unwrap_or_default()));
    }
    if let Some(date) = req.date {
        stored.date = parse_date(&date, "date")?;
    }

    conn.execute(
        "UPDATE journal_entries SET title = ?1, content = ?2, mood = ?3, tags = ?4, date = ?5,
                                    updated_at = ?6
         WHERE id = ?7 AND user_id = ?8",
        params![
            stored.title,
            stored.content,
            stored.mood,
            stored.tags,
            stored.date,
            Utc::now(),
            entry_id,
            user_id
        ],
    )?;
    let entry = load_entry(&conn, user_id, entry_id)?.decrypt(&state.cipher);

    Ok(Json(json!({
        "message": "Journal entry updated successfully",
        "entry": entry,
    })))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(entry_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let user_id = subject.user_id()?;
    let conn = state.storage.conn()?;
    let deleted = conn.execute(
        "DELETE FROM journal_entries WHERE id = ?1 AND user_id = ?2",
        params![entry_id, user_id],
    )?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Journal entry not found".to_string()));
    }

    Ok(Json(json!({ "message": "Journal entry deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(title: Option<&str>, content: &str) -> JournalEntry {
        let now = Utc::now();
        JournalEntry {
            id: 1,
            title: title.map(String::from),
            content: content.to_string(),
            mood: None,
            tags: Vec::new(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let e = entry(Some("Morning Pages"), "Walked by the river");
        assert!(matches_search(&e, "river"));
        assert!(matches_search(&e, "morning"));
        assert!(!matches_search(&e, "mountain"));
        assert!(matches_search(&entry(None, "RIVER"), "river"));
    }

    #[test]
    fn test_seal_produces_ciphertext() {
        let cipher = ContentCipher::from_secret("journal-test").unwrap();
        let sealed = seal(&cipher, "dear diary");
        assert_ne!(sealed, "dear diary");
        assert_eq!(cipher.decrypt(Some(&sealed)).as_deref(), Some("dear diary"));
    }

    #[test]
    fn test_reseal_only_touches_legacy_values() {
        let cipher = ContentCipher::from_secret("journal-test").unwrap();

        let resealed = reseal_legacy(&cipher, "old plain text".to_string());
        assert!(cipher.open(&resealed).is_new());

        let token = seal(&cipher, "already sealed");
        assert_eq!(reseal_legacy(&cipher, token.clone()), token);

        let foreign = seal(&ContentCipher::from_secret("other-key").unwrap(), "foreign");
        assert_eq!(reseal_legacy(&cipher, foreign.clone()), foreign);
    }

    #[test]
    fn test_reseal_upgrades_fernet_tokens() {
        // Fernet token for "Written by the old service" under this secret.
        let cipher = ContentCipher::from_secret("legacy-journal-secret").unwrap();
        let fernet = "gAAAAABq1hyC2kLKqgMzTvRyCxct5uJNqoTpzejZjyqX-iHVMAReOEksqPe-\
                      VYhdXTGfZJ6hS4hDHjnOB72ytHacANZGkwK811ExVkzaDXiqYx3Hn6rGzR4=";

        let resealed = reseal_legacy(&cipher, fernet.to_string());
        assert!(ContentCipher::is_current_token(&resealed));
        assert_eq!(
            cipher.open(&resealed),
            Decryption::New("Written by the old service".to_string())
        );

        let other = ContentCipher::from_secret("unrelated").unwrap();
        assert_eq!(reseal_legacy(&other, fernet.to_string()), fernet);
    }
}
