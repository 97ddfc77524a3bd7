//! Life Dashboard HTTP services
//!
//! One library backs two binaries: the dashboard API (`lifedash-server`) and
//! the membership service (`lifedash-members`). Each owns its own SQLite
//! database and shares config, auth, error mapping and rate limiting.

pub mod auth;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod rate_limit;
pub mod server;
pub mod state;
pub mod storage;

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber, `info` unless `RUST_LOG` says otherwise.
pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();
    Ok(())
}
