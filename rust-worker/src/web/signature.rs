//! Shopify webhook signature verification.
//!
//! Shopify signs webhook requests with HMAC-SHA256 over the raw request body,
//! keyed by the app's API secret, and sends the base64 digest in
//! `X-Shopify-Hmac-Sha256`.
//! Reference: https://shopify.dev/docs/apps/build/webhooks/subscribe/https#step-2-validate-the-origin-of-your-webhook-to-ensure-its-coming-from-shopify

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use super::handlers::AppState;
use crate::shop::ShopDomain;

type HmacSha256 = Hmac<Sha256>;

pub const HMAC_HEADER: &str = "x-shopify-hmac-sha256";
pub const SHOP_DOMAIN_HEADER: &str = "x-shopify-shop-domain";
pub const TOPIC_HEADER: &str = "x-shopify-topic";
pub const WEBHOOK_ID_HEADER: &str = "x-shopify-webhook-id";

/// Largest webhook body accepted for verification.
pub const MAX_WEBHOOK_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Verify a Shopify webhook signature.
///
/// # Arguments
///
/// * `secrets` - Accepted signing secrets (current first, then any previous one)
/// * `body` - The raw request body, exactly as received
/// * `provided` - The `X-Shopify-Hmac-Sha256` header value
///
/// # Returns
///
/// `true` if the digest matches under any of the secrets.
pub fn verify_shopify_hmac(secrets: &[&str], body: &[u8], provided: &str) -> bool {
    let provided = provided.trim();
    if secrets.is_empty() || provided.is_empty() {
        warn!(
            has_secret = !secrets.is_empty(),
            has_signature = !provided.is_empty(),
            "webhook_signature_missing_fields"
        );
        return false;
    }

    let Ok(expected) = STANDARD.decode(provided) else {
        warn!(signature_length = provided.len(), "webhook_signature_not_base64");
        return false;
    };

    secrets.iter().filter(|s| !s.is_empty()).any(|secret| {
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(body);
        // verify_slice compares in constant time
        mac.verify_slice(&expected).is_ok()
    })
}

/// Compute the header value Shopify would send for `body`.
#[cfg(test)]
pub(crate) fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Webhook metadata established by [`verify_webhook`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedWebhook {
    pub shop_domain: ShopDomain,
    pub topic: Option<String>,
    pub webhook_id: Option<String>,
}

impl VerifiedWebhook {
    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let shop_domain = header_str(headers, SHOP_DOMAIN_HEADER)
            .and_then(|raw| ShopDomain::parse(raw).ok())?;

        Some(Self {
            shop_domain,
            topic: header_str(headers, TOPIC_HEADER).map(str::to_string),
            webhook_id: header_str(headers, WEBHOOK_ID_HEADER).map(str::to_string),
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Middleware that rejects requests not signed by Shopify.
///
/// Buffers the body, checks the HMAC header against the configured secrets,
/// then parses the shop domain header. Responds `401` on a bad or missing
/// signature and `400` on a missing shop domain; otherwise inserts a
/// [`VerifiedWebhook`] extension and forwards the request with its body.
pub async fn verify_webhook(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();

    let bytes = match to_bytes(body, MAX_WEBHOOK_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %parts.uri.path(), error = %e, "webhook_body_unreadable");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let secrets = state.config.webhook_secrets();
    if secrets.is_empty() {
        warn!(path = %parts.uri.path(), "webhook_secret_not_configured");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let provided = header_str(&parts.headers, HMAC_HEADER).unwrap_or_default();
    if !verify_shopify_hmac(&secrets, &bytes, provided) {
        warn!(
            path = %parts.uri.path(),
            has_signature = !provided.is_empty(),
            body_length = bytes.len(),
            "webhook_signature_invalid"
        );
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let Some(verified) = VerifiedWebhook::from_headers(&parts.headers) else {
        warn!(
            path = %parts.uri.path(),
            shop_domain = ?header_str(&parts.headers, SHOP_DOMAIN_HEADER),
            "webhook_shop_domain_invalid"
        );
        return StatusCode::BAD_REQUEST.into_response();
    };

    parts.extensions.insert(verified);
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
