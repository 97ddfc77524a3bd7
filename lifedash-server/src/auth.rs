//! Bearer JWT issuing and the auth middleware.

use crate::error::ApiError;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// JWT payload. `sub` is the user id on the dashboard and the member email
/// on the membership service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signer and verifier.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            ttl,
        }
    }

    pub fn issue(&self, subject: &str) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("Failed to generate token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => ApiError::Unauthorized("Token has expired".into()),
                _ => ApiError::InvalidToken("Invalid token".into()),
            })
    }
}

/// The authenticated subject, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct Subject(pub String);

impl Subject {
    /// Dashboard subjects are numeric user ids.
    pub fn user_id(&self) -> Result<i64, ApiError> {
        self.0
            .parse()
            .map_err(|_| ApiError::InvalidToken("Invalid token subject".into()))
    }

    pub fn email(&self) -> &str {
        &self.0
    }
}

/// Auth middleware: requires `Authorization: Bearer <jwt>` on every request.
pub async fn require_bearer(
    State(keys): State<JwtKeys>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".into()))?
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Invalid auth scheme".into()))?
        .trim()
        .to_string();

    let claims = keys.verify(&token)?;
    request.extensions_mut().insert(Subject(claims.sub));

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let keys = JwtKeys::new("test-secret-that-is-long-enough-123", Duration::hours(1));
        let token = keys.issue("42").unwrap();
        let claims = keys.verify(&token).unwrap();

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(Subject(claims.sub).user_id().unwrap(), 42);
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let keys = JwtKeys::new("secret-one-secret-one-secret-one", Duration::hours(1));
        let other = JwtKeys::new("secret-two-secret-two-secret-two", Duration::hours(1));
        let token = keys.issue("1").unwrap();

        assert!(matches!(other.verify(&token), Err(ApiError::InvalidToken(_))));
        assert!(matches!(keys.verify("garbage"), Err(ApiError::InvalidToken(_))));
    }

    #[test]
    fn test_expired_is_unauthorized() {
        // Past the default 60 second leeway.
        let keys = JwtKeys::new("expired-secret-expired-secret-00", Duration::minutes(-5));
        let token = keys.issue("1").unwrap();

        assert!(matches!(keys.verify(&token), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_non_numeric_subject() {
        assert!(Subject("a@example.com".into()).user_id().is_err());
    }
}
