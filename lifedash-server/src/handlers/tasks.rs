//! Task handlers.

use super::{nullable, parse_datetime, required};
use crate::auth::Subject;
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use lifedash_core::database::Task;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct TaskFilter {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub priority: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<String>>,
}

fn load_task(conn: &Connection, user_id: i64, task_id: i64) -> Result<Task, ApiError> {
    conn.query_row(
        &format!(
            "SELECT {} FROM tasks WHERE id = ?1 AND user_id = ?2",
            Task::COLUMNS
        ),
        params![task_id, user_id],
        Task::from_row,
    )
    .optional()?
    .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))
}

fn parse_due_date(value: Option<&str>) -> Result<Option<chrono::NaiveDateTime>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_datetime(v, "due_date").map(Some),
        None => Ok(None),
    }
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let user_id = subject.user_id()?;

    let mut sql = format!("SELECT {} FROM tasks WHERE user_id = ?", Task::COLUMNS);
    let mut args = vec![SqlValue::Integer(user_id)];
    for (column, value) in [
        ("status", filter.status),
        ("priority", filter.priority),
        ("category", filter.category),
    ] {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            sql.push_str(&format!(" AND {} = ?", column));
            args.push(SqlValue::Text(value));
        }
    }
    sql.push_str(" ORDER BY due_date IS NULL, due_date ASC, id ASC");

    let conn = state.storage.conn()?;
    let mut stmt = conn.prepare(&sql)?;
    let tasks = stmt
        .query_map(params_from_iter(args), Task::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user_id = subject.user_id()?;
    let title = required(req.title, "Title is required")?;
    let due_date = parse_due_date(req.due_date.as_deref())?;
    let status = req.status.unwrap_or_else(|| "pending".to_string());
    let now = Utc::now();
    let completed_at = (status == "completed").then_some(now);

    let conn = state.storage.conn()?;
    conn.execute(
        "INSERT INTO tasks (user_id, title, description, priority, status, category, due_date,
                            completed_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            user_id,
            title,
            req.description,
            req.priority.unwrap_or_else(|| "medium".to_string()),
            status,
            req.category,
            due_date,
            completed_at,
            now
        ],
    )?;
    let task = load_task(&conn, user_id, conn.last_insert_rowid())?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Task created successfully", "task": task })),
    ))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(task_id): Path<i64>,
) -> Result<Json<Task>, ApiError> {
    let conn = state.storage.conn()?;
    Ok(Json(load_task(&conn, subject.user_id()?, task_id)?))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(task_id): Path<i64>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = subject.user_id()?;
    let conn = state.storage.conn()?;
    let mut task = load_task(&conn, user_id, task_id)?;
    let now = Utc::now();

    if let Some(title) = req.title {
        task.title = required(Some(title), "Title cannot be empty")?;
    }
    if let Some(description) = req.description {
        task.description = description;
    }
    if let Some(priority) = req.priority {
        task.priority = priority;
    }
    if let Some(category) = req.category {
        task.category = category;
    }
    if let Some(due_date) = req.due_date {
        task.due_date = parse_due_date(due_date.as_deref())?;
    }
    if let Some(status) = req.status {
        match status.as_str() {
            "completed" if task.completed_at.is_none() => task.completed_at = Some(now),
            "pending" => task.completed_at = None,
            _ => {}
        }
        task.status = status;
    }

    conn.execute(
        "UPDATE tasks SET title = ?1, description = ?2, priority = ?3, status = ?4,
                          category = ?5, due_date = ?6, completed_at = ?7, updated_at = ?8
         WHERE id = ?9 AND user_id = ?10",
        params![
            task.title,
            task.description,
            task.priority,
            task.status,
            task.category,
            task.due_date,
            task.completed_at,
            now,
            task.id,
            user_id
        ],
    )?;
    let task = load_task(&conn, user_id, task_id)?;

    Ok(Json(
        json!({ "message": "Task updated successfully", "task": task }),
    ))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(task_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let user_id = subject.user_id()?;
    let conn = state.storage.conn()?;
    let deleted = conn.execute(
        "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
        params![task_id, user_id],
    )?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    Ok(Json(json!({ "message": "Task deleted successfully" })))
}
