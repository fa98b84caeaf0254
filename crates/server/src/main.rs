//! Timekeep - attendance timesheet and overtime service
//!
//! Main entry point: loads configuration, starts the job scheduler and
//! serves the device push endpoint until Ctrl-C.

use anyhow::Context;
use timekeep_infra::{config, observability};
use timekeep_server::{router, AppContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `.env` must be loaded before the env-first config loader runs
    let dotenv = dotenvy::dotenv();

    let config = config::load().context("failed to load configuration")?;
    let _log_guard = observability::init(&config.logging).context("failed to initialise logging")?;

    match dotenv {
        Ok(path) => tracing::info!(path = %path.display(), "Loaded .env"),
        Err(e) => tracing::debug!(error = %e, "No .env file loaded"),
    }

    let bind = config.server.bind.clone();
    let context = AppContext::new(config).context("failed to initialise application context")?;
    let mut scheduler = context.start_scheduler().await.context("failed to start scheduler")?;

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(address = %bind, "server.listening");

    axum::serve(listener, router(context.push.clone()))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await
        .context("server error")?;

    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.stop().await.context("failed to stop scheduler")?;
    }
    tracing::info!("server.stopped");
    Ok(())
}
