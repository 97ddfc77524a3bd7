//! Cryptographic primitives for the dashboard.
//!
//! This module provides:
//! - SHA-256 derivation of the content key from a configured secret
//! - AES-256-GCM encryption of free-text fields at rest
//! - Argon2id password hashing

pub mod cipher;
pub mod kdf;
pub mod password;

pub use cipher::{ContentCipher, Decryption};
pub use kdf::{derive_content_key, ContentKey};
pub use password::{hash_password, verify_password};

use thiserror::Error;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption secret is not configured")]
    MissingSecret,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Authentication failed - data may have been tampered with")]
    AuthenticationFailed,

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
