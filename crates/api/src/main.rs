//! calsync - Google Calendar watch/sync server
//!
//! Main entry point: loads configuration, wires the sync engine, starts the
//! maintenance scheduler and serves the HTTP API until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use calsync_api::utils::init_tracing;
use calsync_api::{router, AppContext};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before reading configuration from the environment
    let dotenv = dotenvy::dotenv();

    let config = calsync_infra::config::load().context("failed to load configuration")?;
    init_tracing(config.server.json_logs);

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(e) => debug!(error = %e, "No .env file loaded"),
    }

    let context = Arc::new(AppContext::new(config).context("failed to initialize application")?);

    let mut scheduler = context.maintenance_scheduler();
    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.start().await.context("failed to start maintenance scheduler")?;
    }

    let bind_address = context.config.server.bind_address.clone();
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!(address = %bind_address, "calsync listening");

    axum::serve(listener, router(Arc::clone(&context)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(mut scheduler) = scheduler {
        if let Err(err) = scheduler.stop().await {
            error!(error = %err, "Failed to stop maintenance scheduler");
        }
    }

    info!("calsync stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
