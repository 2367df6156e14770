//! Shop-scoped Admin API sessions.
//!
//! Privileged work for a shop runs inside a session: an authenticated API
//! context built from the shop's access token. A session is acquired from a
//! [`SessionScope`] and released when its [`SessionGuard`] drops, so teardown
//! happens on every exit path including early returns and panics.

use std::fmt;
use std::ops::Deref;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use super::Shop;

/// Header carrying the Admin API access token.
pub const ACCESS_TOKEN_HEADER: &str = "x-shopify-access-token";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("shop {0} has no access token")]
    MissingToken(String),

    #[error("access token for shop {0} is not a valid header value")]
    InvalidToken(String),

    #[error("invalid admin url for shop {shop}: {source}")]
    InvalidUrl {
        shop: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Authenticated Admin API context for one shop.
#[derive(Clone)]
pub struct ShopifySession {
    shop_domain: String,
    api_version: String,
    base_url: Url,
    client: Client,
}

impl ShopifySession {
    pub fn shop_domain(&self) -> &str {
        &self.shop_domain
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// `https://{shop}/admin/api/{version}/`
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a path relative to the versioned Admin API root.
    pub fn admin_url(&self, path: &str) -> Result<Url, SessionError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|source| SessionError::InvalidUrl {
                shop: self.shop_domain.clone(),
                source,
            })
    }

    /// HTTP client that sends the shop's access token on every request.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl fmt::Debug for ShopifySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShopifySession")
            .field("shop_domain", &self.shop_domain)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

/// Acquires and releases shop sessions.
pub trait SessionScope: Send + Sync {
    /// Open an authenticated session for `shop`.
    fn activate(&self, shop: &Shop) -> Result<ShopifySession, SessionError>;

    /// Release a session previously returned by [`SessionScope::activate`].
    fn deactivate(&self, session: &ShopifySession);
}

/// Session scope that builds Admin API clients from stored access tokens.
#[derive(Debug, Clone)]
pub struct ShopifyApiScope {
    api_version: String,
    timeout: Duration,
}

impl ShopifyApiScope {
    pub fn new(api_version: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_version: api_version.into(),
            timeout,
        }
    }
}

impl SessionScope for ShopifyApiScope {
    fn activate(&self, shop: &Shop) -> Result<ShopifySession, SessionError> {
        if shop.shopify_token.trim().is_empty() {
            return Err(SessionError::MissingToken(shop.shopify_domain.clone()));
        }

        let mut token = HeaderValue::from_str(&shop.shopify_token)
            .map_err(|_| SessionError::InvalidToken(shop.shopify_domain.clone()))?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(ACCESS_TOKEN_HEADER, token);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .build()?;

        let base_url = Url::parse(&format!(
            "https://{}/admin/api/{}/",
            shop.shopify_domain, self.api_version
        ))
        .map_err(|source| SessionError::InvalidUrl {
            shop: shop.shopify_domain.clone(),
            source,
        })?;

        info!(
            shop_domain = %shop.shopify_domain,
            api_version = %self.api_version,
            "shopify_session_activated"
        );

        Ok(ShopifySession {
            shop_domain: shop.shopify_domain.clone(),
            api_version: self.api_version.clone(),
            base_url,
            client,
        })
    }

    fn deactivate(&self, session: &ShopifySession) {
        info!(shop_domain = %session.shop_domain, "shopify_session_deactivated");
    }
}

/// Active session; deactivated when dropped.
pub struct SessionGuard<'a> {
    scope: &'a dyn SessionScope,
    session: ShopifySession,
}

impl<'a> SessionGuard<'a> {
    pub fn open(scope: &'a dyn SessionScope, shop: &Shop) -> Result<Self, SessionError> {
        let session = scope.activate(shop)?;
        Ok(Self { scope, session })
    }
}

impl Deref for SessionGuard<'_> {
    type Target = ShopifySession;

    fn deref(&self) -> &ShopifySession {
        &self.session
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        debug!(shop_domain = %self.session.shop_domain, "session_guard_dropped");
        self.scope.deactivate(&self.session);
    }
}

/// Run `work` inside a session for `shop`.
///
/// The session is deactivated after `work` returns, whether or not it
/// succeeded.
pub fn with_shopify_session<T>(
    scope: &dyn SessionScope,
    shop: &Shop,
    work: impl FnOnce(&ShopifySession) -> T,
) -> Result<T, SessionError> {
    let guard = SessionGuard::open(scope, shop)?;
    Ok(work(&guard))
}
