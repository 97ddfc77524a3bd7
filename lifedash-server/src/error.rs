//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lifedash_core::{CryptoError, DashboardError};

/// API errors mapped to HTTP status codes.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// Missing header, expired token or bad credentials.
    Unauthorized(String),
    /// A malformed or badly signed JWT.
    InvalidToken(String),
    NotFound(String),
    Conflict(String),
    RateLimited,
    Database(String),
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(e) => write!(f, "Bad request: {}", e),
            Self::Unauthorized(e) => write!(f, "Unauthorized: {}", e),
            Self::InvalidToken(e) => write!(f, "Invalid token: {}", e),
            Self::NotFound(e) => write!(f, "Not found: {}", e),
            Self::Conflict(e) => write!(f, "Conflict: {}", e),
            Self::RateLimited => write!(f, "Rate limited"),
            Self::Database(e) => write!(f, "Database error: {}", e),
            Self::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(e) => (StatusCode::BAD_REQUEST, e),
            Self::Unauthorized(e) => (StatusCode::UNAUTHORIZED, e),
            Self::InvalidToken(e) => (StatusCode::UNPROCESSABLE_ENTITY, e),
            Self::NotFound(e) => (StatusCode::NOT_FOUND, e),
            Self::Conflict(e) => (StatusCode::CONFLICT, e),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many attempts, try again later".to_string(),
            ),
            Self::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            Self::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<CryptoError> for ApiError {
    fn from(e: CryptoError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<DashboardError> for ApiError {
    fn from(e: DashboardError) -> Self {
        match e {
            DashboardError::Database(e) => Self::Database(e.to_string()),
            DashboardError::Crypto(e) => Self::Internal(e.to_string()),
            DashboardError::InvalidInput(e) => Self::BadRequest(e),
            DashboardError::NotFound(e) => Self::NotFound(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::InvalidToken("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT),
            (ApiError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (ApiError::Database("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_dashboard_error_conversion() {
        let e: ApiError = DashboardError::InvalidInput("Invalid month".into()).into();
        assert!(matches!(e, ApiError::BadRequest(ref m) if m == "Invalid month"));

        let e: ApiError = DashboardError::NotFound("Habit".into()).into();
        assert!(matches!(e, ApiError::NotFound(_)));

        let e: ApiError = DashboardError::Database(rusqlite::Error::QueryReturnedNoRows).into();
        assert!(matches!(e, ApiError::Database(_)));
    }
}
