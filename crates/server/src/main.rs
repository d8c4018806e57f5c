mod admin;
mod api;
mod bootstrap;
mod health;
mod orders;

use std::time::Duration;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;

use tierline_core::config::{AppConfig, LoadOptions};

use crate::bootstrap::AppState;

fn init_logging(config: &AppConfig) {
    use tierline_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/orders", post(orders::create_order))
        .route("/admin/pricing-profiles", post(admin::create_pricing_profile))
        .route("/admin/order-entries/recompute-costs", post(admin::recompute_costs))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "tierline-server started"
    );

    let shutdown_grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let db_pool = app.db_pool.clone();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let serve = axum::serve(listener, router(app.state())).with_graceful_shutdown(async move {
        let _ = shutdown_rx.await;
    });
    let mut server = tokio::spawn(async move { serve.await });

    tokio::signal::ctrl_c().await?;
    tracing::info!(
        event_name = "system.server.shutdown_signal",
        grace_secs = shutdown_grace.as_secs(),
        "shutdown signal received, draining connections"
    );
    let _ = shutdown_tx.send(());

    match drain_with_deadline(&mut server, shutdown_grace).await {
        Some(result) => result?,
        None => tracing::warn!(
            event_name = "system.server.drain_timeout",
            grace_secs = shutdown_grace.as_secs(),
            "graceful drain window elapsed, server task aborted"
        ),
    }

    tracing::info!(event_name = "system.server.stopping", "tierline-server stopping");
    db_pool.close().await;

    Ok(())
}

/// Wait for the draining server task, aborting it once the grace window
/// elapses. Returns the task's result, or `None` when it had to be aborted.
async fn drain_with_deadline<T>(
    handle: &mut tokio::task::JoinHandle<T>,
    grace: Duration,
) -> Option<T> {
    match tokio::time::timeout(grace, &mut *handle).await {
        Ok(joined) => joined.ok(),
        Err(_) => {
            handle.abort();
            None
        }
    }
}
