//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p sync_server -- [--config server.json] [--addr 127.0.0.1:40000] [--max-frame-len 65536]
//!
//! Accepts participants, keeps their positions and pushes the full world to
//! everybody on every change. Ctrl-C stops accepting and exits.

use std::env;

use anyhow::Context;
use sync_server::SyncServer;
use sync_shared::config::SyncConfig;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = SyncConfig::from_args(env::args().skip(1)).context("parse arguments")?;
    info!(addr = %cfg.server_addr, max_frame_len = cfg.max_frame_len, "Starting server");

    let server = SyncServer::bind(cfg).await.context("create server")?;
    let local = server.local_addr()?;
    info!(%local, "Server listening");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    let hub = server.hub();
    info!(participants = hub.participant_count().await, "Server stopped");
    Ok(())
}
