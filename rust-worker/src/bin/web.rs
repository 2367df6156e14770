//! Shopify base web server - mandatory webhook receiver.
//!
//! This binary provides a thin, fast web server that:
//! - Receives Shopify's mandatory (GDPR) webhooks
//! - Verifies the HMAC signature
//! - Immediately enqueues one job per webhook
//! - Returns 204 No Content
//!
//! All job work happens in the background worker.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shopify_base::web::{router, AppState};
use shopify_base::{queue, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        environment = %config.environment,
        port = config.port,
        queue_backend = config.queue_label(),
        webhook_secret_configured = config.shopify_api_secret.is_some(),
        previous_secret_configured = config.shopify_api_secret_old.is_some(),
        "config_loaded"
    );

    if config.shopify_api_secret.is_none() {
        warn!("webhook_secret_not_configured");
    }

    let job_queue = queue::connect(&config.queue);
    info!(queue_backend = config.queue_label(), "job_queue_created");

    let state = AppState::new(config.clone(), job_queue.clone());
    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    job_queue.close().await;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
