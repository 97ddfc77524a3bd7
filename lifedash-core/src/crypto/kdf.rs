//! Content key derivation.
//!
//! The content key is SHA-256 of the configured secret. Derivation is
//! deterministic so every process sharing the configuration can read what
//! any other process wrote.

use crate::crypto::{CryptoError, Result};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// A 256-bit AES key derived from the configured secret.
#[derive(Clone)]
pub struct ContentKey {
    key: [u8; 32],
}

impl ContentKey {
    /// Wrap raw key bytes
    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Get the raw key bytes (use sparingly)
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl Drop for ContentKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ContentKey(..)")
    }
}

/// Derive the content key from a configured secret.
///
/// An empty or whitespace-only secret is rejected; there is no fallback key.
pub fn derive_content_key(secret: &str) -> Result<ContentKey> {
    if secret.trim().is_empty() {
        return Err(CryptoError::MissingSecret);
    }

    let digest = Sha256::digest(secret.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);

    Ok(ContentKey { key })
}
