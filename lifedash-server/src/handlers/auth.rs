//! Dashboard registration, login and profile handlers.

use super::{hash_blocking, nullable, today, verify_blocking};
use crate::auth::Subject;
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use lifedash_core::database::User;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::{json, Value};

const THEMES: [&str; 2] = ["dark", "light"];

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub last_name: Option<Option<String>>,
    pub theme_preference: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub age: Option<Option<i64>>,
    pub budget: Option<f64>,
}

fn credentials(
    email: Option<String>,
    password: Option<String>,
) -> Result<(String, String), ApiError> {
    let email = email.map(|e| e.trim().to_lowercase()).unwrap_or_default();
    let password = password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::BadRequest("Email and password are required".to_string()));
    }
    Ok((email, password))
}

pub(crate) fn load_user(conn: &Connection, user_id: i64) -> Result<User, ApiError> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
        [user_id],
        User::from_row,
    )
    .optional()?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

fn find_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, ApiError> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", User::COLUMNS),
            [email],
            User::from_row,
        )
        .optional()?;
    Ok(user)
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (email, password) = credentials(req.email, req.password)?;
    let password_hash = hash_blocking(password).await?;

    let conn = state.storage.conn()?;
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        [&email],
        |row| row.get(0),
    )?;
    if exists {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let now = Utc::now();
    conn.execute(
        "INSERT INTO users (email, password_hash, first_name, last_name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![
            email,
            password_hash,
            req.first_name.unwrap_or_default(),
            req.last_name.unwrap_or_default(),
            now
        ],
    )?;
    let user = load_user(&conn, conn.last_insert_rowid())?;
    let access_token = state.jwt.issue(&user.id.to_string())?;

    tracing::info!(user_id = user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "user": user,
            "access_token": access_token,
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let (email, password) = credentials(req.email, req.password)?;

    if !state.login_limiter.check(&email) {
        tracing::warn!(%email, "Login rate limited");
        return Err(ApiError::RateLimited);
    }

    let user = {
        let conn = state.storage.conn()?;
        find_user_by_email(&conn, &email)?
    };

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());
    let user = user.ok_or_else(invalid)?;
    if !verify_blocking(password, user.password_hash.clone()).await? {
        return Err(invalid());
    }

    let streak = user.login_streak().advance(today());
    let conn = state.storage.conn()?;
    conn.execute(
        "UPDATE users SET current_streak = ?1, longest_streak = ?2, last_login = ?3
         WHERE id = ?4",
        params![streak.current, streak.longest, streak.last_login, user.id],
    )?;

    let user = load_user(&conn, user.id)?;
    let access_token = state.jwt.issue(&user.id.to_string())?;

    Ok(Json(json!({
        "message": "Login successful",
        "user": user,
        "access_token": access_token,
    })))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
) -> Result<Json<User>, ApiError> {
    let conn = state.storage.conn()?;
    Ok(Json(load_user(&conn, subject.user_id()?)?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, ApiError> {
    let conn = state.storage.conn()?;
    let mut user = load_user(&conn, subject.user_id()?)?;

    if let Some(first_name) = req.first_name {
        user.first_name = first_name;
    }
    if let Some(last_name) = req.last_name {
        user.last_name = last_name;
    }
    if let Some(theme) = req.theme_preference {
        if !THEMES.contains(&theme.as_str()) {
            return Err(ApiError::BadRequest(format!("Invalid theme: {}", theme)));
        }
        user.theme_preference = theme;
    }
    if let Some(age) = req.age {
        user.age = age;
    }
    if let Some(budget) = req.budget {
        if !budget.is_finite() || budget < 0.0 {
            return Err(ApiError::BadRequest("Budget must be non-negative".to_string()));
        }
        user.budget = budget;
    }

    conn.execute(
        "UPDATE users SET first_name = ?1, last_name = ?2, theme_preference = ?3, age = ?4,
                          budget = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            user.first_name,
            user.last_name,
            user.theme_preference,
            user.age,
            user.budget,
            Utc::now(),
            user.id
        ],
    )?;
    let user = load_user(&conn, user.id)?;

    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": user,
    })))
}
