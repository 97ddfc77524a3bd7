//! Axum router setup for both services.

use crate::auth::require_bearer;
use crate::handlers::{auth, calendar, expenses, habits, journal, members, tasks};
use crate::state::{AppState, MembersState};
use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

fn cors(frontend_url: &str) -> CorsLayer {
    let origin = match HeaderValue::from_str(frontend_url) {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            tracing::warn!(%frontend_url, "Invalid frontend_url, CORS will reject all origins");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Router for the dashboard API.
pub fn build_router(state: AppState, frontend_url: &str, max_payload_size: usize) -> Router {
    let authenticated = Router::new()
        .route(
            "/api/auth/profile",
            get(auth::get_profile).put(auth::update_profile),
        )
        .route("/api/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/api/tasks/{id}",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route(
            "/api/habits",
            get(habits::list_habits).post(habits::create_habit),
        )
        .route(
            "/api/habits/{id}",
            put(habits::update_habit).delete(habits::delete_habit),
        )
        .route("/api/habits/{id}/log", post(habits::log_habit))
        .route("/api/habits/{id}/logs", get(habits::habit_logs))
        .route(
            "/api/expenses",
            get(expenses::list_expenses).post(expenses::create_expense),
        )
        .route("/api/expenses/summary", get(expenses::expense_summary))
        .route("/api/expenses/categories", get(expenses::expense_categories))
        .route(
            "/api/expenses/{id}",
            put(expenses::update_expense).delete(expenses::delete_expense),
        )
        .route(
            "/api/journal",
            get(journal::list_entries).post(journal::create_entry),
        )
        .route(
            "/api/journal/{id}",
            get(journal::get_entry)
                .put(journal::update_entry)
                .delete(journal::delete_entry),
        )
        .route(
            "/api/calendar",
            get(calendar::list_events).post(calendar::create_event),
        )
        .route("/api/calendar/events", get(calendar::range_items))
        .route("/api/calendar/month", get(calendar::month_view))
        .route(
            "/api/calendar/{id}",
            put(calendar::update_event).delete(calendar::delete_event),
        )
        .layer(middleware::from_fn_with_state(
            state.jwt.clone(),
            require_bearer,
        ));

    let public = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/health", get(health));

    Router::new()
        .merge(authenticated)
        .merge(public)
        .layer(cors(frontend_url))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_payload_size))
        .with_state(state)
}

/// Router for the membership service.
pub fn build_members_router(
    state: MembersState,
    frontend_url: &str,
    max_payload_size: usize,
) -> Router {
    let authenticated = Router::new()
        .route(
            "/member/profile",
            get(members::get_profile).patch(members::update_profile),
        )
        .route("/password/change", post(members::change_password))
        .route("/me", get(members::get_profile))
        .layer(middleware::from_fn_with_state(
            state.jwt.clone(),
            require_bearer,
        ));

    let public = Router::new()
        .route("/auth/member/register", post(members::register))
        .route("/auth/member/login", post(members::login))
        .route("/password/reset-request", post(members::reset_request))
        .route("/password/reset-confirm", post(members::reset_confirm))
        .route("/verify/email", post(members::verify_email))
        .route("/verify/phone", post(members::verify_phone))
        .route("/health", get(members_health));

    Router::new()
        .merge(authenticated)
        .merge(public)
        .layer(cors(frontend_url))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_payload_size))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "message": "Life Dashboard API is running",
    }))
}

async fn members_health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "message": "Membership service is running",
    }))
}
