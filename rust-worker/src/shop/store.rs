//! Shop lookup backends.
//!
//! [`PgShopStore`] reads the `shops` table owned by the app's installation
//! flow; this crate never writes to it. [`InMemoryShopStore`] backs the test
//! environment and deployments without a `DATABASE_URL`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;

use super::Shop;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Lookup-by-domain capability over persisted shops.
#[async_trait]
pub trait ShopStore: Send + Sync {
    /// Find the shop installed on `domain`, if any.
    async fn find_by_domain(&self, domain: &str) -> Result<Option<Shop>, StoreError>;
}

#[derive(Debug, sqlx::FromRow)]
struct ShopRow {
    id: i64,
    shopify_domain: String,
    shopify_token: String,
}

impl From<ShopRow> for Shop {
    fn from(row: ShopRow) -> Self {
        Shop::new(row.id, row.shopify_domain, row.shopify_token)
    }
}

/// Postgres-backed shop store.
#[derive(Clone)]
pub struct PgShopStore {
    pool: PgPool,
}

impl PgShopStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShopStore for PgShopStore {
    async fn find_by_domain(&self, domain: &str) -> Result<Option<Shop>, StoreError> {
        let row: Option<ShopRow> = sqlx::query_as(
            "SELECT id::BIGINT AS id, shopify_domain, shopify_token \
             FROM shops WHERE shopify_domain = $1 LIMIT 1",
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;

        debug!(shop_domain = %domain, found = row.is_some(), "shop_lookup");

        Ok(row.map(Shop::from))
    }
}

/// Shop store held in memory.
#[derive(Clone, Default)]
pub struct InMemoryShopStore {
    shops: Arc<RwLock<HashMap<String, Shop>>>,
}

impl InMemoryShopStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a shop, keyed by its domain.
    pub fn insert(&self, shop: Shop) {
        let mut shops = self.shops.write().unwrap_or_else(|e| e.into_inner());
        shops.insert(shop.shopify_domain.clone(), shop);
    }
}

#[async_trait]
impl ShopStore for InMemoryShopStore {
    async fn find_by_domain(&self, domain: &str) -> Result<Option<Shop>, StoreError> {
        let shops = self.shops.read().unwrap_or_else(|e| e.into_inner());
        Ok(shops.get(domain).cloned())
    }
}
