//! Habit handlers, including completion logging and per-habit statistics.

use super::{nullable, parse_optional_date, required, today};
use crate::auth::Subject;
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{Duration, NaiveDate, Utc};
use lifedash_core::database::{record_completion, Habit, HabitLog, SqliteCompletionLog};
use lifedash_core::habits::{DEFAULT_HABIT_COLOR, FREQUENCY_OPTIONS};
use lifedash_core::{completion_rate, current_streak, HabitCompletion};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A habit with its log and derived statistics.
#[derive(Serialize)]
pub struct HabitView {
    #[serde(flatten)]
    pub habit: Habit,
    pub logs: Vec<HabitLog>,
    pub current_streak: u32,
    pub completion_rate: f64,
}

#[derive(Deserialize)]
pub struct CreateHabitRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub frequency: Option<String>,
    pub target_days: Option<i64>,
    pub color: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateHabitRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub frequency: Option<String>,
    pub target_days: Option<i64>,
    pub color: Option<String>,
}

#[derive(Deserialize)]
pub struct LogHabitRequest {
    pub date: Option<String>,
    pub completed: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct LogsQuery {
    pub days: Option<u32>,
}

fn check_frequency(frequency: &str) -> Result<(), ApiError> {
    if FREQUENCY_OPTIONS.contains(&frequency) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Frequency must be one of: {}",
            FREQUENCY_OPTIONS.join(", ")
        )))
    }
}

fn check_target_days(target_days: i64) -> Result<(), ApiError> {
    if target_days >= 1 {
        Ok(())
    } else {
        Err(ApiError::BadRequest("target_days must be positive".to_string()))
    }
}

pub(crate) fn load_habit(
    conn: &Connection,
    user_id: i64,
    habit_id: i64,
) -> Result<Habit, ApiError> {
    conn.query_row(
        &format!(
            "SELECT {} FROM habits WHERE id = ?1 AND user_id = ?2",
            Habit::COLUMNS
        ),
        params![habit_id, user_id],
        Habit::from_row,
    )
    .optional()?
    .ok_or_else(|| ApiError::NotFound("Habit not found".to_string()))
}

fn all_logs(conn: &Connection, habit_id: i64) -> Result<Vec<HabitLog>, ApiError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM habit_logs WHERE habit_id = ?1 ORDER BY date DESC",
        HabitLog::COLUMNS
    ))?;
    let logs = stmt
        .query_map([habit_id], HabitLog::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(logs)
}

fn logs_between(
    conn: &Connection,
    habit_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<HabitLog>, ApiError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM habit_logs WHERE habit_id = ?1 AND date BETWEEN ?2 AND ?3
         ORDER BY date DESC",
        HabitLog::COLUMNS
    ))?;
    let logs = stmt
        .query_map(params![habit_id, from, to], HabitLog::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(logs)
}

fn habit_view(conn: &Connection, habit: Habit, today: NaiveDate) -> Result<HabitView, ApiError> {
    let log = SqliteCompletionLog::new(conn);
    let current_streak = current_streak(&log, habit.id, today)?;
    let completion_rate = completion_rate(&log, habit.id, today)?;
    let logs = all_logs(conn, habit.id)?;

    Ok(HabitView {
        habit,
        logs,
        current_streak,
        completion_rate,
    })
}

pub async fn list_habits(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
) -> Result<Json<Vec<HabitView>>, ApiError> {
    let user_id = subject.user_id()?;
    let conn = state.storage.conn()?;
    let today = today();

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM habits WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        Habit::COLUMNS
    ))?;
    let habits = stmt
        .query_map([user_id], Habit::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let views = habits
        .into_iter()
        .map(|habit| habit_view(&conn, habit, today))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(views))
}

pub async fn create_habit(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(req): Json<CreateHabitRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user_id = subject.user_id()?;
    let name = required(req.name, "Name is required")?;
    let frequency = req.frequency.unwrap_or_else(|| "daily".to_string());
    check_frequency(&frequency)?;
    let target_days = req.target_days.unwrap_or(7);
    check_target_days(target_days)?;
    let now = Utc::now();

    let conn = state.storage.conn()?;
    conn.execute(
        "INSERT INTO habits (user_id, name, description, frequency, target_days, color,
                             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            user_id,
            name,
            req.description,
            frequency,
            target_days,
            req.color.unwrap_or_else(|| DEFAULT_HABIT_COLOR.to_string()),
            now
        ],
    )?;
    let habit = load_habit(&conn, user_id, conn.last_insert_rowid())?;
    let view = habit_view(&conn, habit, today())?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Habit created successfully", "habit": view })),
    ))
}

pub async fn update_habit(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(habit_id): Path<i64>,
    Json(req): Json<UpdateHabitRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = subject.user_id()?;
    let conn = state.storage.conn()?;
    let mut habit = load_habit(&conn, user_id, habit_id)?;

    if let Some(name) = req.name {
        habit.name = required(Some(name), "Name cannot be empty")?;
    }
    if let Some(description) = req.description {
        habit.description = description;
    }
    if let Some(frequency) = req.frequency {
        check_frequency(&frequency)?;
        habit.frequency = frequency;
    }
    if let Some(target_days) = req.target_days {
        check_target_days(target_days)?;
        habit.target_days = target_days;
    }
    if let Some(color) = req.color {
        habit.color = color;
    }

    conn.execute(
        "UPDATE habits SET name = ?1, description = ?2, frequency = ?3, target_days = ?4,
                           color = ?5, updated_at = ?6
         WHERE id = ?7 AND user_id = ?8",
        params![
            habit.name,
            habit.description,
            habit.frequency,
            habit.target_days,
            habit.color,
            Utc::now(),
            habit_id,
            user_id
        ],
    )?;
    let habit = load_habit(&conn, user_id, habit_id)?;
    let view = habit_view(&conn, habit, today())?;

    Ok(Json(
        json!({ "message": "Habit updated successfully", "habit": view }),
    ))
}

pub async fn delete_habit(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(habit_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let user_id = subject.user_id()?;
    let conn = state.storage.conn()?;
    let deleted = conn.execute(
        "DELETE FROM habits WHERE id = ?1 AND user_id = ?2",
        params![habit_id, user_id],
    )?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Habit not found".to_string()));
    }

    Ok(Json(json!({ "message": "Habit deleted successfully" })))
}

pub async fn log_habit(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(habit_id): Path<i64>,
    Json(req): Json<LogHabitRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user_id = subject.user_id()?;
    let today = today();
    let date = parse_optional_date(req.date.as_deref(), "date")?.unwrap_or(today);

    let conn = state.storage.conn()?;
    load_habit(&conn, user_id, habit_id)?;

    record_completion(
        &conn,
        &HabitCompletion {
            habit_id,
            date,
            completed: req.completed.unwrap_or(true),
            notes: req.notes,
        },
    )?;
    let streak = current_streak(&SqliteCompletionLog::new(&conn), habit_id, today)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Habit logged successfully",
            "current_streak": streak,
        })),
    ))
}

pub async fn habit_logs(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(habit_id): Path<i64>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<HabitLog>>, ApiError> {
    let user_id = subject.user_id()?;
    let today = today();
    let days = query.days.unwrap_or(30);
    let from = today
        .checked_sub_signed(Duration::days(i64::from(days)))
        .ok_or_else(|| ApiError::BadRequest(format!("days out of range: {}", days)))?;

    let conn = state.storage.conn()?;
    load_habit(&conn, user_id, habit_id)?;

    Ok(Json(logs_between(&conn, habit_id, from, today)?))
}
