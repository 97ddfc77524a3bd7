//! Life Dashboard API server
//!
//! Serves tasks, habits, expenses, the encrypted journal and the calendar
//! for authenticated users.

use clap::Parser;
use lifedash_core::database::Schema;
use lifedash_server::cleanup::spawn_cleanup_task;
use lifedash_server::config::ConfigArgs;
use lifedash_server::state::AppState;
use lifedash_server::storage::Storage;
use lifedash_server::{init_tracing, server};

#[derive(Parser)]
#[command(name = "lifedash-server", about = "Life Dashboard API server")]
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
        cfg.listen_addr = listen;
    }
    if let Some(database) = cli.config.database {
        cfg.storage_path = database;
    }
    let secrets = cfg.resolve_secrets()?;

    tracing::info!(
        environment = ?cfg.environment,
        "Starting Life Dashboard API on {}",
        cfg.listen_addr
    );

    let storage = Storage::open(&cfg.storage_path, Schema::Dashboard)?;
    let state = AppState::new(storage, &cfg, &secrets)?;
    spawn_cleanup_task(vec![state.login_limiter.clone()], None, cfg.cleanup_interval_secs);
    let app = server::build_router(state, &cfg.frontend_url, cfg.max_payload_size);

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
