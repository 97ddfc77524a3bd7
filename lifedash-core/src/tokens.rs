//! Password-reset tokens and verification codes for the membership service

use crate::{DashboardError, Result};
use chrono::{DateTime, Duration, Utc};
use rand::{Rng, RngCore};
use rusqlite::{params, Connection, OptionalExtension};
use std::fmt;

/// What a row in `tokens` is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    PasswordReset,
    EmailVerification,
    PhoneVerification,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PasswordReset => "password_reset",
            Self::EmailVerification => "email_verification",
            Self::PhoneVerification => "phone_verification",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A uniformly random 4-digit code, 1000 to 9999.
pub fn generate_verification_code() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Token bookkeeping over the membership database.
///
/// Every check takes the current time from the caller.
pub struct TokenService<'a> {
    conn: &'a Connection,
}

impl<'a> TokenService<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a password-reset token of `bytes` random bytes, hex encoded.
    pub fn create_reset_token(
        &self,
        email: &str,
        ttl: Duration,
        bytes: usize,
        now: DateTime<Utc>,
    ) -> Result<String> {
        if bytes == 0 {
            return Err(DashboardError::InvalidInput(
                "Reset token length must be positive".to_string(),
            ));
        }

        let token = random_hex(bytes);
        self.insert(&token, email, TokenKind::PasswordReset, None, now + ttl, now)?;
        Ok(token)
    }

    /// Mark `token` used if it is an unused, unexpired reset token issued to
    /// `email`. Returns false otherwise.
    ///
    /// Check and consume happen in one statement, so a token is accepted at
    /// most once even when confirmations race.
    pub fn consume_reset_token(
        &self,
        email: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE tokens SET is_used = 1
             WHERE token = ?1 AND email = ?2 AND token_type = ?3
               AND is_used = 0 AND expires_at > ?4",
            params![token, email, TokenKind::PasswordReset.as_str(), now],
        )?;
        Ok(updated == 1)
    }

    /// Store a verification code for `email`.
    pub fn store_code(
        &self,
        email: &str,
        kind: TokenKind,
        code: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.insert(&random_hex(16), email, kind, Some(code), now + ttl, now)
    }

    /// Consume the newest unused, unexpired code of `kind` for `email`.
    ///
    /// Returns false when no such code exists or it does not match.
    pub fn verify_code(
        &self,
        email: &str,
        kind: TokenKind,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let newest: Option<(String, Option<String>)> = self
            .conn
            .query_row(
                "SELECT token, code FROM tokens
                 WHERE email = ?1 AND token_type = ?2 AND is_used = 0 AND expires_at > ?3
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1",
                params![email, kind.as_str(), now],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match newest {
            Some((token, Some(stored))) if stored == code => self.mark_used(&token),
            _ => Ok(false),
        }
    }

    /// Delete expired and used tokens. Returns the number removed.
    pub fn prune(&self, now: DateTime<Utc>) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM tokens WHERE is_used = 1 OR expires_at <= ?1",
            [now],
        )?;
        Ok(deleted)
    }

    fn mark_used(&self, token: &str) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE tokens SET is_used = 1 WHERE token = ?1 AND is_used = 0",
            [token],
        )?;
        Ok(updated == 1)
    }

    fn insert(
        &self,
        token: &str,
        email: &str,
        kind: TokenKind,
        code: Option<&str>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO tokens (token, email, token_type, code, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![token, email, kind.as_str(), code, expires_at, now],
        )?;
        Ok(())
    }
}
