//! Calendar events plus the combined task and habit views.

use super::{nullable, parse_date, parse_datetime, required, today};
use crate::auth::Subject;
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use lifedash_core::calendar::{days_between, month_bounds, priority_color, year_month};
use lifedash_core::database::CalendarEvent;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[derive(Deserialize)]
pub struct MonthQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Deserialize)]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub event_type: Option<String>,
    pub location: Option<String>,
    pub priority: Option<String>,
    pub color: Option<String>,
    pub reminder: Option<bool>,
    pub related_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub event_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub location: Option<Option<String>>,
    pub priority: Option<String>,
    pub color: Option<String>,
    pub reminder: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub related_id: Option<Option<i64>>,
}

/// A task or habit log placed on the calendar.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CalendarItem {
    Task {
        id: String,
        title: String,
        description: Option<String>,
        date: Option<NaiveDateTime>,
        priority: String,
        status: String,
        color: &'static str,
    },
    Habit {
        id: String,
        title: String,
        description: Option<String>,
        date: NaiveDate,
        completed: bool,
        color: String,
    },
}

#[derive(Debug, Serialize)]
pub struct DayTask {
    pub id: i64,
    pub title: String,
    pub priority: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct DayHabit {
    pub id: i64,
    pub name: String,
    pub completed: bool,
    pub color: String,
}

#[derive(Debug, Default, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub tasks: Vec<DayTask>,
    pub habits: Vec<DayHabit>,
}

#[derive(Debug, Serialize)]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub calendar: Vec<CalendarDay>,
}

struct DueTask {
    id: i64,
    title: String,
    description: Option<String>,
    due_date: NaiveDateTime,
    priority: String,
    status: String,
}

struct LoggedHabit {
    log_id: i64,
    habit_id: i64,
    name: String,
    description: Option<String>,
    date: NaiveDate,
    completed: bool,
    color: String,
}

fn resolve_month(query: &MonthQuery) -> Result<(i32, u32, NaiveDate, NaiveDate), ApiError> {
    let (this_year, this_month) = year_month(today());
    let year = query.year.unwrap_or(this_year);
    let month = query.month.unwrap_or(this_month);
    let (first, last) = month_bounds(year, month)?;
    Ok((year, month, first, last))
}

fn tasks_due(
    conn: &Connection,
    user_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<DueTask>, ApiError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, due_date, priority, status FROM tasks
         WHERE user_id = ?1 AND due_date IS NOT NULL AND date(due_date) BETWEEN ?2 AND ?3
         ORDER BY due_date",
    )?;
    let tasks = stmt
        .query_map(params![user_id, start, end], |row| {
            Ok(DueTask {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                due_date: row.get(3)?,
                priority: row.get(4)?,
                status: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

fn habits_logged(
    conn: &Connection,
    user_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<LoggedHabit>, ApiError> {
    let mut stmt = conn.prepare(
        "SELECT l.id, h.id, h.name, h.description, l.date, l.completed, h.color
         FROM habit_logs l JOIN habits h ON h.id = l.habit_id
         WHERE h.user_id = ?1 AND l.date BETWEEN ?2 AND ?3
         ORDER BY l.date, h.id",
    )?;
    let logs = stmt
        .query_map(params![user_id, start, end], |row| {
            Ok(LoggedHabit {
                log_id: row.get(0)?,
                habit_id: row.get(1)?,
                name: row.get(2)?,
                description: row.get(3)?,
                date: row.get(4)?,
                completed: row.get(5)?,
                color: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(logs)
}

fn load_event(conn: &Connection, user_id: i64, event_id: i64) -> Result<CalendarEvent, ApiError> {
    conn.query_row(
        &format!(
            "SELECT {} FROM calendar_events WHERE id = ?1 AND user_id = ?2",
            CalendarEvent::COLUMNS
        ),
        params![event_id, user_id],
        CalendarEvent::from_row,
    )
    .optional()?
    .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))
}

fn check_span(start: NaiveDateTime, end: NaiveDateTime) -> Result<(), ApiError> {
    if end < start {
        return Err(ApiError::BadRequest("end_time must not be before start_time".to_string()));
    }
    Ok(())
}

pub async fn list_events(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<Vec<CalendarEvent>>, ApiError> {
    let user_id = subject.user_id()?;
    let (_, _, first, last) = resolve_month(&query)?;

    let conn = state.storage.conn()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM calendar_events
         WHERE user_id = ?1 AND date(start_time) BETWEEN ?2 AND ?3
         ORDER BY start_time",
        CalendarEvent::COLUMNS
    ))?;
    let events = stmt
        .query_map(params![user_id, first, last], CalendarEvent::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(events))
}

pub async fn create_event(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user_id = subject.user_id()?;
    let missing = "Title, start_time, and end_time are required";
    let title = required(req.title, missing)?;
    let start_time = parse_datetime(&required(req.start_time, missing)?, "start_time")?;
    let end_time = parse_datetime(&required(req.end_time, missing)?, "end_time")?;
    check_span(start_time, end_time)?;
    let now = Utc::now();

    let conn = state.storage.conn()?;
    conn.execute(
        "INSERT INTO calendar_events (user_id, title, description, start_time, end_time,
                                      event_type, location, priority, color, reminder,
                                      related_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
        params![
            user_id,
            title,
            req.description,
            start_time,
            end_time,
            req.event_type.unwrap_or_else(|| "personal".to_string()),
            req.location,
            req.priority.unwrap_or_else(|| "medium".to_string()),
            req.color.unwrap_or_else(|| "#1a1a1a".to_string()),
            req.reminder.unwrap_or(false),
            req.related_id,
            now
        ],
    )?;
    let event = load_event(&conn, user_id, conn.last_insert_rowid())?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Event created successfully", "event": event })),
    ))
}

pub async fn update_event(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(event_id): Path<i64>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = subject.user_id()?;
    let conn = state.storage.conn()?;
    let mut event = load_event(&conn, user_id, event_id)?;

    if let Some(title) = req.title {
        event.title = required(Some(title), "Title cannot be empty")?;
    }
    if let Some(description) = req.description {
        event.description = description;
    }
    if let Some(start_time) = req.start_time {
        event.start_time = parse_datetime(&start_time, "start_time")?;
    }
    if let Some(end_time) = req.end_time {
        event.end_time = parse_datetime(&end_time, "end_time")?;
    }
    check_span(event.start_time, event.end_time)?;
    if let Some(event_type) = req.event_type {
        event.event_type = event_type;
    }
    if let Some(location) = req.location {
        event.location = location;
    }
    if let Some(priority) = req.priority {
        event.priority = priority;
    }
    if let Some(color) = req.color {
        event.color = color;
    }
    if let Some(reminder) = req.reminder {
        event.reminder = reminder;
    }
    if let Some(related_id) = req.related_id {
        event.related_id = related_id;
    }

    conn.execute(
        "UPDATE calendar_events SET title = ?1, description = ?2, start_time = ?3,
                end_time = ?4, event_type = ?5, location = ?6, priority = ?7, color = ?8,
                reminder = ?9, related_id = ?10, updated_at = ?11
         WHERE id = ?12 AND user_id = ?13",
        params![
            event.title,
            event.description,
            event.start_time,
            event.end_time,
            event.event_type,
            event.location,
            event.priority,
            event.color,
            event.reminder,
            event.related_id,
            Utc::now(),
            event_id,
            user_id
        ],
    )?;
    let event = load_event(&conn, user_id, event_id)?;

    Ok(Json(
        json!({ "message": "Event updated successfully", "event": event }),
    ))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(event_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let user_id = subject.user_id()?;
    let conn = state.storage.conn()?;
    let deleted = conn.execute(
        "DELETE FROM calendar_events WHERE id = ?1 AND user_id = ?2",
        params![event_id, user_id],
    )?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Event not found".to_string()));
    }

    Ok(Json(json!({ "message": "Event deleted successfully" })))
}

/// Tasks due and habit logs recorded within a date range.
pub async fn range_items(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<CalendarItem>>, ApiError> {
    let user_id = subject.user_id()?;
    let missing = "start_date and end_date are required";
    let start = parse_date(&required(query.start_date, missing)?, "start_date")?;
    let end = parse_date(&required(query.end_date, missing)?, "end_date")?;

    let conn = state.storage.conn()?;
    let mut items: Vec<CalendarItem> = tasks_due(&conn, user_id, start, end)?
        .into_iter()
        .map(|task| CalendarItem::Task {
            id: format!("task-{}", task.id),
            color: priority_color(&task.priority),
            title: task.title,
            description: task.description,
            date: Some(task.due_date),
            priority: task.priority,
            status: task.status,
        })
        .collect();

    items.extend(
        habits_logged(&conn, user_id, start, end)?
            .into_iter()
            .map(|log| CalendarItem::Habit {
                id: format!("habit-{}", log.log_id),
                title: log.name,
                description: log.description,
                date: log.date,
                completed: log.completed,
                color: log.color,
            }),
    );

    Ok(Json(items))
}

/// Day-by-day grid of tasks and habit logs for one month.
pub async fn month_view(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<MonthView>, ApiError> {
    let user_id = subject.user_id()?;
    let (year, month, first, last) = resolve_month(&query)?;

    let mut days: BTreeMap<NaiveDate, CalendarDay> = days_between(first, last)
        .into_iter()
        .map(|date| {
            (
                date,
                CalendarDay {
                    date,
                    ..CalendarDay::default()
                },
            )
        })
        .collect();

    let conn = state.storage.conn()?;
    for task in tasks_due(&conn, user_id, first, last)? {
        if let Some(day) = days.get_mut(&task.due_date.date()) {
            day.tasks.push(DayTask {
                id: task.id,
                title: task.title,
                priority: task.priority,
                status: task.status,
            });
        }
    }
    for log in habits_logged(&conn, user_id, first, last)? {
        if let Some(day) = days.get_mut(&log.date) {
            day.habits.push(DayHabit {
                id: log.habit_id,
                name: log.name,
                completed: log.completed,
                color: log.color,
            });
        }
    }

    Ok(Json(MonthView {
        year,
        month,
        calendar: days.into_values().collect(),
    }))
}
