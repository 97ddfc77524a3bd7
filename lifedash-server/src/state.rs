//! Shared handler state for the two services.

use crate::auth::JwtKeys;
use crate::config::{Secrets, ServerConfig};
use crate::notify::Notifier;
use crate::rate_limit::RateLimiter;
use crate::storage::Storage;
use chrono::Duration;
use lifedash_core::ContentCipher;
use std::sync::Arc;

/// State for the dashboard API.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub cipher: ContentCipher,
    pub jwt: JwtKeys,
    pub login_limiter: RateLimiter,
}

impl AppState {
    pub fn new(storage: Storage, config: &ServerConfig, secrets: &Secrets) -> anyhow::Result<Self> {
        Ok(Self {
            storage,
            cipher: ContentCipher::from_secret(&secrets.encryption_key)?,
            jwt: JwtKeys::new(
                &secrets.jwt_secret,
                Duration::hours(config.access_token_ttl_hours),
            ),
            login_limiter: RateLimiter::new(config.login_attempts_per_minute),
        })
    }
}

/// Lifetimes and sizes for membership tokens.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub reset_ttl: Duration,
    pub reset_bytes: usize,
    pub code_ttl: Duration,
    /// Return the reset token in the response body. Development only.
    pub echo_reset_token: bool,
}

impl From<&ServerConfig> for TokenSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            reset_ttl: Duration::minutes(config.reset_token_minutes),
            reset_bytes: config.reset_token_bytes,
            code_ttl: Duration::minutes(config.verification_code_minutes),
            echo_reset_token: !config.environment.is_production(),
        }
    }
}

/// State for the membership service.
#[derive(Clone)]
pub struct MembersState {
    pub storage: Storage,
    pub jwt: JwtKeys,
    pub login_limiter: RateLimiter,
    pub verify_limiter: RateLimiter,
    pub notifier: Arc<dyn Notifier>,
    pub tokens: TokenSettings,
}

impl MembersState {
    pub fn new(
        storage: Storage,
        config: &ServerConfig,
        secrets: &Secrets,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            storage,
            jwt: JwtKeys::new(
                &secrets.jwt_secret,
                Duration::minutes(config.members_access_token_minutes),
            ),
            login_limiter: RateLimiter::new(config.login_attempts_per_minute),
            verify_limiter: RateLimiter::new(config.verify_attempts_per_minute),
            notifier,
            tokens: TokenSettings::from(config),
        }
    }
}
