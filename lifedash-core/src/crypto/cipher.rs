//! AES-256-GCM encryption of free-text fields at rest.
//!
//! Stored tokens are URL-safe base64 (no padding) of
//! `version(1) || nonce(12) || ciphertext || auth_tag(16)`.
//!
//! Two older shapes are still read:
//! - Fernet tokens from the earlier service, keyed by the same SHA-256
//!   digest in Fernet's URL-safe base64 key format.
//! - Plain text from before encryption was introduced.
//!
//! Decryption never fails outward: anything that is not a readable token is
//! handed back as stored, and the branch taken is reported through
//! [`Decryption`] and the log level.

use crate::crypto::kdf::{derive_content_key, ContentKey};
use crate::crypto::{CryptoError, Result};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use fernet::Fernet;
use zeroize::Zeroizing;

const TOKEN_VERSION: u8 = 0x01;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const MIN_TOKEN_LEN: usize = 1 + NONCE_LEN + TAG_LEN;

const FERNET_VERSION: u8 = 0x80;
// version(1) || timestamp(8) || iv(16) || one AES block(16) || hmac(32)
const FERNET_MIN_LEN: usize = 1 + 8 + 16 + 16 + 32;

/// Outcome of reading a stored field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decryption {
    /// A token written by this cipher or a Fernet token under the same
    /// secret, decrypted and authenticated.
    New(String),
    /// Not shaped like a token; assumed to be plain text from before encryption.
    LegacyPassthrough(String),
    /// Shaped like a token but could not be authenticated. Holds the stored value.
    Failed(String),
}

impl Decryption {
    /// The string handed to callers, whichever branch fired.
    pub fn into_inner(self) -> String {
        match self {
            Self::New(s) | Self::LegacyPassthrough(s) | Self::Failed(s) => s,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::New(_))
    }
}

/// Symmetric cipher for journal titles and content.
#[derive(Debug, Clone)]
pub struct ContentCipher {
    key: ContentKey,
}

impl ContentCipher {
    pub fn new(key: ContentKey) -> Self {
        Self { key }
    }

    /// Build a cipher from the configured secret.
    ///
    /// Fails with [`CryptoError::MissingSecret`] when the secret is empty.
    pub fn from_secret(secret: &str) -> Result<Self> {
        Ok(Self::new(derive_content_key(secret)?))
    }

    /// Encrypt an optional field.
    ///
    /// Absent or empty input yields `None`. If encryption itself fails the
    /// input is returned unchanged and the failure is logged.
    pub fn encrypt(&self, plaintext: Option<&str>) -> Option<String> {
        let plaintext = plaintext.filter(|s| !s.is_empty())?;

        match self.seal(plaintext.as_bytes()) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::error!("Content encryption failed, storing input unchanged: {}", e);
                Some(plaintext.to_string())
            }
        }
    }

    /// Decrypt an optional field. Absent or empty input yields `None`.
    pub fn decrypt(&self, stored: Option<&str>) -> Option<String> {
        let stored = stored.filter(|s| !s.is_empty())?;
        Some(self.open(stored).into_inner())
    }

    /// Classify and decrypt a stored value.
    pub fn open(&self, stored: &str) -> Decryption {
        let (result, format) = if let Some(blob) = current_token(stored) {
            (self.unseal(&blob), "Content")
        } else if is_fernet_token(stored) {
            (self.open_fernet(stored), "Fernet")
        } else {
            tracing::debug!(
                "Stored value is not a content token, passing through as legacy plaintext"
            );
            return Decryption::LegacyPassthrough(stored.to_string());
        };

        match result {
            Ok(plaintext) => Decryption::New(plaintext),
            Err(e) => {
                tracing::warn!(
                    "{} token could not be decrypted, returning stored value: {}",
                    format,
                    e
                );
                Decryption::Failed(stored.to_string())
            }
        }
    }

    /// True when `stored` is in the format [`ContentCipher::encrypt`] writes.
    pub fn is_current_token(stored: &str) -> bool {
        current_token(stored).is_some()
    }

    fn seal(&self, plaintext: &[u8]) -> Result<String> {
        let cipher = Aes256Gcm::new(self.key.as_bytes().into());
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext_with_tag = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(format!("{}", e)))?;

        let mut blob = Vec::with_capacity(1 + NONCE_LEN + ciphertext_with_tag.len());
        blob.push(TOKEN_VERSION);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext_with_tag);

        Ok(URL_SAFE_NO_PAD.encode(blob))
    }

    fn open_fernet(&self, token: &str) -> Result<String> {
        let key = Zeroizing::new(URL_SAFE.encode(self.key.as_bytes()));
        let fernet = Fernet::new(&key)
            .ok_or_else(|| CryptoError::DecryptionFailed("Invalid Fernet key".to_string()))?;
        let plaintext = fernet
            .decrypt(token)
            .map_err(|_| CryptoError::AuthenticationFailed)?;

        String::from_utf8(plaintext)
            .map_err(|_| CryptoError::DecryptionFailed("Invalid UTF-8".to_string()))
    }

    fn unseal(&self, blob: &[u8]) -> Result<String> {
        let nonce_bytes: [u8; NONCE_LEN] = blob[1..1 + NONCE_LEN]
            .try_into()
            .map_err(|_| CryptoError::DecryptionFailed("Invalid nonce length".to_string()))?;
        let ciphertext_with_tag = &blob[1 + NONCE_LEN..];

        let cipher = Aes256Gcm::new(self.key.as_bytes().into());
        let plaintext = cipher
            .decrypt(&Nonce::from(nonce_bytes), ciphertext_with_tag)
            .map_err(|_| CryptoError::AuthenticationFailed)?;

        String::from_utf8(plaintext)
            .map_err(|_| CryptoError::DecryptionFailed("Invalid UTF-8".to_string()))
    }
}

fn current_token(stored: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(stored)
        .ok()
        .filter(|blob| blob.len() >= MIN_TOKEN_LEN && blob[0] == TOKEN_VERSION)
}

fn is_fernet_token(stored: &str) -> bool {
    URL_SAFE
        .decode(stored)
        .or_else(|_| URL_SAFE_NO_PAD.decode(stored))
        .is_ok_and(|blob| blob.len() >= FERNET_MIN_LEN && blob[0] == FERNET_VERSION)
}
