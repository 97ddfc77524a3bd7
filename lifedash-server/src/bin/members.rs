//! Membership service
//!
//! Member registration, login and profile, password resets and
//! email/phone verification codes.

use clap::Parser;
use lifedash_core::database::Schema;
use lifedash_server::cleanup::spawn_cleanup_task;
use lifedash_server::config::ConfigArgs;
use lifedash_server::notify::LogNotifier;
use lifedash_server::state::MembersState;
use lifedash_server::storage::Storage;
use lifedash_server::{init_tracing, server};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lifedash-members", about = "Life Dashboard membership service")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let mut cfg = cli.config.load()?;
    if let Some(listen) = cli.config.listen {
        cfg.members_listen_addr = listen;
    }
    if let Some(database) = cli.config.database {
        cfg.members_storage_path = database;
    }
    let secrets = cfg.resolve_secrets()?;

    tracing::info!(
        environment = ?cfg.environment,
        "Starting membership service on {}",
        cfg.members_listen_addr
    );

    let storage = Storage::open(&cfg.members_storage_path, Schema::Membership)?;
    let state = MembersState::new(storage, &cfg, &secrets, Arc::new(LogNotifier));
    spawn_cleanup_task(
        vec![state.login_limiter.clone(), state.verify_limiter.clone()],
        Some(state.storage.clone()),
        cfg.cleanup_interval_secs,
    );
    let app = server::build_members_router(state, &cfg.frontend_url, cfg.max_payload_size);

    let listener = tokio::net::TcpListener::bind(&cfg.members_listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
