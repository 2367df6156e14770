//! Webhook endpoint handlers.
//!
//! These handlers are designed to be extremely fast - they only:
//! 1. Read the payload (already verified by [`verify_webhook`](super::signature::verify_webhook))
//! 2. Enqueue one job for the endpoint's job class
//! 3. Return `204 No Content`
//!
//! What the job later does has no effect on the response.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::queue::{JobEnvelope, JobKind, JobQueue};
use crate::web::params::parse_webhook_payload;
use crate::web::signature::VerifiedWebhook;
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub queue: Arc<dyn JobQueue>,
}

impl AppState {
    pub fn new(config: Config, queue: Arc<dyn JobQueue>) -> Self {
        Self {
            config: Arc::new(config),
            queue,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Mandatory Webhooks
// =============================================================================

/// `POST /webhooks/shop_redact`
pub async fn shop_redact(
    State(state): State<AppState>,
    Extension(webhook): Extension<VerifiedWebhook>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> StatusCode {
    enqueue_webhook(&state, JobKind::ShopRedact, webhook, query.as_deref(), &body).await
}

/// `POST /webhooks/customers_redact`
pub async fn customers_redact(
    State(state): State<AppState>,
    Extension(webhook): Extension<VerifiedWebhook>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> StatusCode {
    enqueue_webhook(&state, JobKind::CustomersRedact, webhook, query.as_deref(), &body).await
}

/// `POST /webhooks/customers_data_request`
pub async fn customers_data_request(
    State(state): State<AppState>,
    Extension(webhook): Extension<VerifiedWebhook>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> StatusCode {
    enqueue_webhook(&state, JobKind::CustomersDataRequest, webhook, query.as_deref(), &body).await
}

/// Turn a verified webhook into one enqueued job.
///
/// Redeliveries are not deduplicated here; each accepted request enqueues.
async fn enqueue_webhook(
    state: &AppState,
    kind: JobKind,
    webhook: VerifiedWebhook,
    query: Option<&str>,
    body: &[u8],
) -> StatusCode {
    info!(
        job_class = %kind,
        shop_domain = %webhook.shop_domain,
        topic = ?webhook.topic,
        webhook_id = ?webhook.webhook_id,
        body_length = body.len(),
        "webhook_received"
    );

    let payload = match parse_webhook_payload(body, query) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(job_class = %kind, error = %e, "webhook_payload_invalid");
            return StatusCode::BAD_REQUEST;
        }
    };

    let job = JobEnvelope::new(
        kind,
        webhook.shop_domain.into_inner(),
        payload,
        webhook.topic,
        webhook.webhook_id,
    );

    if let Err(e) = state.queue.enqueue(&job).await {
        error!(job_id = %job.job_id, job_class = %kind, error = %e, "webhook_enqueue_failed");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    info!(
        job_id = %job.job_id,
        job_class = %kind,
        shop_domain = %job.shop_domain,
        "webhook_enqueued"
    );

    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::queue::InMemoryQueue;
    use crate::web::router;
    use crate::web::signature::{
        sign_body, HMAC_HEADER, SHOP_DOMAIN_HEADER, TOPIC_HEADER, WEBHOOK_ID_HEADER,
    };
    use anyhow::Result;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const SECRET: &str = "webhook-secret";
    const SHOP: &str = "snowdevil.myshopify.com";

    fn test_config(secret: Option<&str>) -> Config {
        let secret = secret.map(str::to_string);
        Config::from_lookup(move |name| match name {
            "APP_ENV" => Some("test".to_string()),
            "SHOPIFY_API_SECRET" => secret.clone(),
            _ => None,
        })
        .unwrap()
    }

    fn app_with(secret: Option<&str>) -> (Router, InMemoryQueue) {
        let queue = InMemoryQueue::new();
        let state = AppState::new(test_config(secret), Arc::new(queue.clone()));
        (router(state), queue)
    }

    fn signed_request(path: &str, body: &str, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .header(SHOP_DOMAIN_HEADER, SHOP)
            .header(TOPIC_HEADER, "shop/redact")
            .header(WEBHOOK_ID_HEADER, "b54557e4-bdd9-4b37-8a5f-bf7d70bcd043");

        if let Some(signature) = signature {
            builder = builder.header(HMAC_HEADER, signature);
        }

        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_each_endpoint_enqueues_one_job() {
        let body = json!({
            "shop_id": 954889,
            "shop_domain": SHOP,
            "customer": {"id": 191167, "email": "john@example.com", "phone": null},
            "controller": "mandatory_webhooks",
            "action": "ignored"
        })
        .to_string();

        for kind in JobKind::ALL {
            let (app, queue) = app_with(Some(SECRET));

            let response = app
                .oneshot(signed_request(kind.route(), &body, Some(sign_body(SECRET, body.as_bytes()))))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::NO_CONTENT, "{kind}");
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert!(bytes.is_empty());

            let jobs = queue.jobs();
            assert_eq!(jobs.len(), 1, "{kind}");
            let job = &jobs[0];
            assert_eq!(job.job_class, kind);
            assert_eq!(job.shop_domain, SHOP);
            assert_eq!(job.job_id, "b54557e4-bdd9-4b37-8a5f-bf7d70bcd043");
            assert_eq!(
                Value::Object(job.webhook.clone()),
                json!({
                    "shop_id": 954889,
                    "shop_domain": SHOP,
                    "customer": {"id": 191167, "email": "john@example.com", "phone": null}
                })
            );
        }
    }

    #[tokio::test]
    async fn test_query_params_join_the_payload() {
        let body = r#"{"shop_id":954889}"#;
        let (app, queue) = app_with(Some(SECRET));

        let response = app
            .oneshot(signed_request(
                "/webhooks/customers_data_request?utm_source=partner&action=x",
                body,
                Some(sign_body(SECRET, body.as_bytes())),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let jobs = queue.jobs();
        assert_eq!(
            Value::Object(jobs[0].webhook.clone()),
            json!({"shop_id": 954889, "utm_source": "partner"})
        );
    }

    #[tokio::test]
    async fn test_invalid_signature_never_enqueues() {
        let body = r#"{"shop_id":954889}"#;

        for signature in [None, Some("bm90LXRoZS1zaWduYXR1cmU=".to_string()), Some(sign_body("other", body.as_bytes()))] {
            let (app, queue) = app_with(Some(SECRET));

            let response = app
                .oneshot(signed_request("/webhooks/shop_redact", body, signature))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert!(queue.is_empty());
        }
    }

    #[tokio::test]
    async fn test_unconfigured_secret_rejects() {
        let body = r#"{"shop_id":954889}"#;
        let (app, queue) = app_with(None);

        let response = app
            .oneshot(signed_request(
                "/webhooks/customers_redact",
                body,
                Some(sign_body(SECRET, body.as_bytes())),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_missing_shop_domain_is_bad_request() {
        let body = r#"{"shop_id":954889}"#;
        let (app, queue) = app_with(Some(SECRET));

        let request = Request::builder()
            .method("POST")
            .uri("/webhooks/shop_redact")
            .header(HMAC_HEADER, sign_body(SECRET, body.as_bytes()))
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let body = "{not json";
        let (app, queue) = app_with(Some(SECRET));

        let response = app
            .oneshot(signed_request(
                "/webhooks/customers_data_request",
                body,
                Some(sign_body(SECRET, body.as_bytes())),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_redelivery_enqueues_again() {
        let body = r#"{"shop_id":954889}"#;
        let queue = InMemoryQueue::new();
        let app = router(AppState::new(test_config(Some(SECRET)), Arc::new(queue.clone())));

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(signed_request(
                    "/webhooks/shop_redact",
                    body,
                    Some(sign_body(SECRET, body.as_bytes())),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }

        assert_eq!(queue.len(), 2);
    }

    struct FailingQueue;

    #[async_trait]
    impl JobQueue for FailingQueue {
        async fn enqueue(&self, _job: &JobEnvelope) -> Result<()> {
            anyhow::bail!("broker unavailable")
        }
    }

    #[tokio::test]
    async fn test_enqueue_failure_is_server_error() {
        let body = r#"{"shop_id":954889}"#;
        let app = router(AppState::new(test_config(Some(SECRET)), Arc::new(FailingQueue)));

        let response = app
            .oneshot(signed_request(
                "/webhooks/shop_redact",
                body,
                Some(sign_body(SECRET, body.as_bytes())),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_health_needs_no_signature() {
        let (app, _queue) = app_with(Some(SECRET));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], br#"{"status":"ok"}"#);
    }
}
