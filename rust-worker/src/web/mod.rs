//! Web server module for handling Shopify's mandatory webhooks.
//!
//! This module provides a thin, fast web server that:
//! - Receives `shop/redact`, `customers/redact` and `customers/data_request`
//! - Verifies the Shopify HMAC signature
//! - Immediately enqueues one job per webhook
//! - Returns 204 No Content
//!
//! All job work happens in the background worker.

pub mod handlers;
pub mod params;
pub mod signature;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::queue::JobKind;

pub use handlers::{
    customers_data_request, customers_redact, health, shop_redact, AppState, HealthResponse,
};
pub use params::{merge_query, parse_webhook_payload, strip_routing_keys, PayloadError};
pub use signature::{verify_shopify_hmac, verify_webhook, VerifiedWebhook};

/// Build the application router.
///
/// Webhook routes sit behind [`verify_webhook`]; `/health` does not.
pub fn router(state: AppState) -> Router {
    let webhooks = Router::new()
        .route(JobKind::ShopRedact.route(), post(shop_redact))
        .route(JobKind::CustomersRedact.route(), post(customers_redact))
        .route(
            JobKind::CustomersDataRequest.route(),
            post(customers_data_request),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), verify_webhook));

    Router::new()
        .route("/health", get(health))
        .merge(webhooks)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
