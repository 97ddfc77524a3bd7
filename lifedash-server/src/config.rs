//! Server configuration.
//!
//! Values come from a TOML file, then from flags and environment variables.
//! Both binaries read the same file and pick the fields they need.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Minimum JWT secret length accepted in production.
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub environment: Environment,
    pub listen_addr: String,
    pub members_listen_addr: String,
    pub storage_path: PathBuf,
    pub members_storage_path: PathBuf,
    /// Allowed CORS origin.
    pub frontend_url: String,
    pub jwt_secret: Option<String>,
    pub encryption_key: Option<String>,
    pub access_token_ttl_hours: i64,
    pub members_access_token_minutes: i64,
    pub reset_token_minutes: i64,
    pub verification_code_minutes: i64,
    pub reset_token_bytes: usize,
    pub login_attempts_per_minute: u32,
    /// Verification-code guesses allowed per member and code type.
    pub verify_attempts_per_minute: u32,
    pub max_payload_size: usize,
    pub cleanup_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            listen_addr: "127.0.0.1:5000".to_string(),
            members_listen_addr: "127.0.0.1:8000".to_string(),
            storage_path: PathBuf::from("life_dashboard.db"),
            members_storage_path: PathBuf::from("members.db"),
            frontend_url: "http://localhost:5173".to_string(),
            jwt_secret: None,
            encryption_key: None,
            access_token_ttl_hours: 24,
            members_access_token_minutes: 30,
            reset_token_minutes: 10,
            verification_code_minutes: 10,
            reset_token_bytes: 32,
            login_attempts_per_minute: 10,
            verify_attempts_per_minute: 5,
            max_payload_size: 1024 * 1024,
            cleanup_interval_secs: 3600,
        }
    }
}

/// Startup configuration problems.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value is absent or empty.
    Missing(&'static str),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(name) => write!(f, "Configuration missing: {} must be set", name),
            Self::Invalid(e) => write!(f, "Invalid configuration: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Secrets after startup validation.
#[derive(Clone)]
pub struct Secrets {
    pub jwt_secret: String,
    pub encryption_key: String,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secrets(..)")
    }
}

/// The configured value as written, unless it is absent or blank.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml_dep::from_str(&content)?;
        Ok(config)
    }

    /// Validate secrets, failing fast on anything missing.
    ///
    /// A development server without a JWT secret gets a random one for the
    /// life of the process.
    pub fn resolve_secrets(&self) -> Result<Secrets, ConfigError> {
        let encryption_key = non_empty(&self.encryption_key)
            .ok_or(ConfigError::Missing("encryption_key"))?
            .to_string();

        let jwt_secret = match non_empty(&self.jwt_secret) {
            Some(secret) => {
                if self.environment.is_production() && secret.len() < MIN_JWT_SECRET_LEN {
                    return Err(ConfigError::Invalid(format!(
                        "jwt_secret must be at least {} characters in production",
                        MIN_JWT_SECRET_LEN
                    )));
                }
                secret.to_string()
            }
            None if self.environment.is_production() => {
                return Err(ConfigError::Missing("jwt_secret"));
            }
            None => {
                tracing::warn!(
                    "No jwt_secret configured; using a random per-process secret. \
                     Issued tokens will not survive a restart"
                );
                random_secret()
            }
        };

        Ok(Secrets {
            jwt_secret,
            encryption_key,
        })
    }
}

fn random_secret() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Flags shared by both binaries. Each also reads its environment variable.
#[derive(Debug, Clone, clap::Args)]
pub struct ConfigArgs {
    /// Path to configuration file
    #[arg(short, long, env = "LIFEDASH_CONFIG", default_value = "lifedash.toml")]
    pub config: PathBuf,

    /// Deployment environment
    #[arg(long, env = "LIFEDASH_ENV", value_enum)]
    pub environment: Option<Environment>,

    /// Listen address override
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Database path override
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Allowed CORS origin
    #[arg(long, env = "FRONTEND_URL")]
    pub frontend_url: Option<String>,

    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    #[arg(long, env = "ENCRYPTION_KEY", hide_env_values = true)]
    pub encryption_key: Option<String>,
}

impl ConfigArgs {
    /// Read the config file, or defaults when it does not exist, then apply
    /// overrides that do not depend on which service is starting.
    pub fn load(&self) -> anyhow::Result<ServerConfig> {
        let mut cfg = if self.config.exists() {
            ServerConfig::load(&self.config)?
        } else {
            tracing::info!("No config file found, using defaults");
            ServerConfig::default()
        };

        if let Some(environment) = self.environment {
            cfg.environment = environment;
        }
        if let Some(url) = &self.frontend_url {
            cfg.frontend_url = url.clone();
        }
        if self.jwt_secret.is_some() {
            cfg.jwt_secret = self.jwt_secret.clone();
        }
        if self.encryption_key.is_some() {
            cfg.encryption_key = self.encryption_key.clone();
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(environment: Environment, jwt: Option<&str>, key: Option<&str>) -> ServerConfig {
        ServerConfig {
            environment,
            jwt_secret: jwt.map(String::from),
            encryption_key: key.map(String::from),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.access_token_ttl_hours, 24);
        assert_eq!(cfg.members_access_token_minutes, 30);
        assert_eq!(cfg.reset_token_bytes, 32);
        assert_eq!(cfg.max_payload_size, 1024 * 1024);
        assert_eq!(cfg.verify_attempts_per_minute, 5);
    }

    #[test]
    fn test_partial_toml() {
        let cfg: ServerConfig = toml_dep::from_str(
            r#"
            environment = "production"
            listen_addr = "0.0.0.0:9000"
            reset_token_minutes = 15
            "#,
        )
        .unwrap();

        assert!(cfg.environment.is_production());
        assert_eq!(cfg.listen_addr, "0.0.0.0:9000");
        assert_eq!(cfg.reset_token_minutes, 15);
        assert_eq!(cfg.verification_code_minutes, 10);
    }

    #[test]
    fn test_encryption_key_always_required() {
        let dev = config(Environment::Development, Some("x"), None);
        assert_eq!(
            dev.resolve_secrets().unwrap_err(),
            ConfigError::Missing("encryption_key")
        );

        let blank = config(Environment::Development, None, Some("   "));
        assert!(blank.resolve_secrets().is_err());
    }

    #[test]
    fn test_jwt_secret_required_in_production() {
        let prod = config(Environment::Production, None, Some("key"));
        assert_eq!(
            prod.resolve_secrets().unwrap_err(),
            ConfigError::Missing("jwt_secret")
        );

        let short = config(Environment::Production, Some("short"), Some("key"));
        assert!(matches!(
            short.resolve_secrets().unwrap_err(),
            ConfigError::Invalid(_)
        ));

        let long = "s".repeat(MIN_JWT_SECRET_LEN);
        let ok = config(Environment::Production, Some(&long), Some("key"));
        assert_eq!(ok.resolve_secrets().unwrap().jwt_secret, long);
    }

    #[test]
    fn test_development_generates_jwt_secret() {
        let dev = config(Environment::Development, None, Some("key"));
        let first = dev.resolve_secrets().unwrap();
        let second = dev.resolve_secrets().unwrap();

        assert_eq!(first.jwt_secret.len(), 64);
        assert_ne!(first.jwt_secret, second.jwt_secret);
        assert_eq!(first.encryption_key, "key");
    }

    #[test]
    fn test_secrets_kept_byte_for_byte() {
        let cfg = config(Environment::Development, Some(" jwt "), Some(" k "));
        let secrets = cfg.resolve_secrets().unwrap();

        assert_eq!(secrets.encryption_key, " k ");
        assert_eq!(secrets.jwt_secret, " jwt ");
    }
}
