//! Shopify base worker - runs jobs enqueued by the webhook receiver.
//!
//! The worker consumes the shopify_webhook_jobs queue and runs each job:
//! resolve the shop for the webhook, then do the job's work inside that shop's
//! session.

mod consumer;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shopify_base::shop::{InMemoryShopStore, PgShopStore, ShopStore};
use shopify_base::{db, Config, JobContext, QueueBackend, ShopifyApiScope};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    tracing::info!("worker_starting");

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        environment = %config.environment,
        queue_backend = config.queue_label(),
        database_configured = config.database.is_some(),
        concurrency = config.worker_concurrency,
        api_version = %config.shopify_api_version,
        "config_loaded"
    );

    let QueueBackend::Amqp { url, .. } = &config.queue else {
        bail!("The worker needs an AMQP queue; APP_ENV={} has none", config.environment);
    };
    let queue_url = url.clone();

    let shops: Arc<dyn ShopStore> = match &config.database {
        Some(database) => {
            let pool = db::connect(database)
                .await
                .context("Failed to connect to database")?;
            let pool = db::reestablish(pool, database)
                .await
                .context("Failed to re-establish database pool")?;
            Arc::new(PgShopStore::new(pool))
        }
        None => {
            info!("shop_store_in_memory");
            Arc::new(InMemoryShopStore::new())
        }
    };

    let sessions = Arc::new(ShopifyApiScope::new(
        config.shopify_api_version.clone(),
        Duration::from_millis(config.shopify_request_timeout_ms),
    ));

    let ctx = JobContext::new(shops, sessions);

    // Start the consumer
    consumer::run(&queue_url, config.worker_concurrency, ctx).await?;

    Ok(())
}
