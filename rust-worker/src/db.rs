//! Postgres pool for the shop store.
//!
//! The worker discards the pool created during boot and connects a fresh one
//! before consuming jobs, so it never shares connections opened while the
//! process was starting up.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::DatabaseConfig;

/// Open a pool sized by `DATABASE_POOL_SIZE`.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = pool_options(config).connect(&config.url).await?;

    info!(max_connections = config.pool_size, "database_pool_connected");

    Ok(pool)
}

/// Close `pool` and open a replacement with the same settings.
pub async fn reestablish(pool: PgPool, config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    info!(
        pool_size = pool.size(),
        idle = pool.num_idle(),
        max_connections = pool.options().get_max_connections(),
        "database_pool_before_disconnect"
    );

    pool.close().await;

    let pool = pool_options(config).connect(&config.url).await?;

    info!(
        pool_size = pool.size(),
        max_connections = pool.options().get_max_connections(),
        "database_pool_reestablished"
    );

    Ok(pool)
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.pool_size)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
}
