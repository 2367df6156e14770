//! Shops and shop lookup.
//!
//! A [`Shop`] is the tenant record owned by the app's installation flow. This
//! crate only reads it: jobs resolve a shop by its myshopify domain through a
//! [`ShopStore`] and then open a [`session`] for it.

pub mod domain;
pub mod session;
pub mod store;

use std::fmt;

pub use domain::{InvalidShopDomain, ShopDomain};
pub use session::{with_shopify_session, SessionError, SessionGuard, SessionScope, ShopifyApiScope, ShopifySession};
pub use store::{InMemoryShopStore, PgShopStore, ShopStore, StoreError};

/// Installed shop.
#[derive(Clone, PartialEq, Eq)]
pub struct Shop {
    pub id: i64,
    pub shopify_domain: String,
    /// Offline Admin API access token
    pub shopify_token: String,
}

impl Shop {
    pub fn new(id: i64, shopify_domain: impl Into<String>, shopify_token: impl Into<String>) -> Self {
        Self {
            id,
            shopify_domain: shopify_domain.into(),
            shopify_token: shopify_token.into(),
        }
    }
}

impl fmt::Debug for Shop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shop")
            .field("id", &self.id)
            .field("shopify_domain", &self.shopify_domain)
            .field("shopify_token", &"[redacted]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shop_debug_hides_token() {
        let shop = Shop::new(1, "snowdevil.myshopify.com", "shpat_secret");
        let debug = format!("{shop:?}");

        assert!(debug.contains("snowdevil.myshopify.com"));
        assert!(!debug.contains("shpat_secret"));
    }
}
