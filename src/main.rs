//! Greenhouse telemetry service.
//!
//! Polls greenhouse sensor feeds, normalizes and sorts the readings, and
//! serves windowed series, aggregates and trends over HTTP.

mod config;
mod fetch;
mod pipeline;
mod scheduler;
mod web;

use config::ServerConfig;
use scheduler::Scheduler;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("greenhouse_telemetry=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load()?;
    tracing::info!("Starting greenhouse telemetry on port {}...", cfg.http_port);
    tracing::info!(
        "Polling {} every {:?} (timeout {:?})",
        cfg.api_url,
        cfg.poll_interval,
        cfg.request_timeout
    );

    // Start polling
    let scheduler = Arc::new(Scheduler::new(cfg.poll_interval));
    scheduler.start(&cfg).await?;

    // Serve until interrupted
    let server = Server::new(cfg, scheduler.clone());
    server.start(shutdown_signal()).await?;

    scheduler.shutdown().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
