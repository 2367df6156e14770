//! Background jobs triggered by the mandatory webhooks.
//!
//! Every job follows the same contract: receive `(shop_domain, webhook)`,
//! resolve the shop, then run its work inside that shop's session. The work
//! itself is not implemented yet; each job only logs the payload and opens
//! and closes the session.
//!
//! ## Processing Flow
//!
//! ```text
//! JobEnvelope → perform() → <job>::perform() → find shop → with_shopify_session
//! ```

pub mod customers_data_request;
pub mod customers_redact;
pub mod shop_redact;

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::queue::{JobEnvelope, JobKind, WebhookPayload};
use crate::shop::{SessionError, SessionScope, Shop, ShopStore, StoreError};

#[derive(Debug, Error)]
pub enum JobError {
    /// No shop is installed on the webhook's domain.
    #[error("no shop found for domain {0}")]
    ShopNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Collaborators a job needs to run.
#[derive(Clone)]
pub struct JobContext {
    pub shops: Arc<dyn ShopStore>,
    pub sessions: Arc<dyn SessionScope>,
}

impl JobContext {
    pub fn new(shops: Arc<dyn ShopStore>, sessions: Arc<dyn SessionScope>) -> Self {
        Self { shops, sessions }
    }

    /// Look up the shop for a job, failing if it is not installed.
    pub async fn find_shop(&self, shop_domain: &str) -> Result<Shop, JobError> {
        match self.shops.find_by_domain(shop_domain).await? {
            Some(shop) => Ok(shop),
            None => {
                warn!(shop_domain = %shop_domain, "job_shop_not_found");
                Err(JobError::ShopNotFound(shop_domain.to_string()))
            }
        }
    }
}

/// Run the job named by an envelope.
pub async fn perform(ctx: &JobContext, job: &JobEnvelope) -> Result<(), JobError> {
    info!(
        job_id = %job.job_id,
        job_class = %job.job_class,
        shop_domain = %job.shop_domain,
        "job_started"
    );

    let result = match job.job_class {
        JobKind::ShopRedact => shop_redact::perform(ctx, &job.shop_domain, &job.webhook).await,
        JobKind::CustomersRedact => {
            customers_redact::perform(ctx, &job.shop_domain, &job.webhook).await
        }
        JobKind::CustomersDataRequest => {
            customers_data_request::perform(ctx, &job.shop_domain, &job.webhook).await
        }
    };

    if result.is_ok() {
        info!(
            job_id = %job.job_id,
            job_class = %job.job_class,
            "job_completed"
        );
    }

    result
}

/// Run one queue delivery and report whether it should be acknowledged.
///
/// `false` means the body was not a job envelope or the job failed; the
/// caller rejects those deliveries without requeue.
pub async fn run_delivery(ctx: &JobContext, message_id: &str, data: &[u8]) -> bool {
    let job: JobEnvelope = match serde_json::from_slice(data) {
        Ok(job) => job,
        Err(e) => {
            error!(
                message_id = %message_id,
                error = %e,
                body_preview = %String::from_utf8_lossy(&data[..data.len().min(500)]),
                "job_parse_failed"
            );
            return false;
        }
    };

    match perform(ctx, &job).await {
        Ok(()) => true,
        Err(e) => {
            error!(
                message_id = %message_id,
                job_class = %job.job_class,
                shop_domain = %job.shop_domain,
                error = %e,
                "job_failed"
            );
            false
        }
    }
}

/// Log the payload a job received.
fn log_received(kind: JobKind, shop_domain: &str, webhook: &WebhookPayload) {
    let payload = serde_json::to_string(webhook).unwrap_or_default();

    info!(
        job_class = %kind,
        shop_domain = %shop_domain,
        webhook = %payload,
        "{kind} received from webhook"
    );
}


#[cfg(test)]
mod tests {
    use super::testing::{context, SHOP_DOMAIN};
    use super::*;
    use serde_json::json;

    fn envelope(kind: JobKind, shop_domain: &str) -> JobEnvelope {
        let webhook = json!({
            "shop_id": 954889,
            "shop_domain": shop_domain,
            "customer": {"id": 191167, "email": "john@example.com", "phone": "555-625-1199"},
            "orders_requested": [299938, 280263, 220458]
        });

        JobEnvelope::new(
            kind,
            shop_domain.to_string(),
            webhook.as_object().cloned().unwrap(),
            Some(kind.topic().to_string()),
            None,
        )
    }

    #[tokio::test]
    async fn test_every_job_opens_one_session_for_known_shop() {
        for kind in JobKind::ALL {
            let (ctx, sessions) = context();

            perform(&ctx, &envelope(kind, SHOP_DOMAIN)).await.unwrap();

            assert_eq!(sessions.activations(), 1, "{kind} activations");
            assert_eq!(sessions.deactivations(), 1, "{kind} deactivations");
        }
    }

    #[tokio::test]
    async fn test_every_job_fails_for_unknown_shop() {
        for kind in JobKind::ALL {
            let (ctx, sessions) = context();

            let err = perform(&ctx, &envelope(kind, "unknown.myshopify.com"))
                .await
                .unwrap_err();

            assert!(
                matches!(&err, JobError::ShopNotFound(domain) if domain == "unknown.myshopify.com"),
                "{kind}: unexpected error {err}"
            );
            assert_eq!(sessions.activations(), 0);
        }
    }

    #[tokio::test]
    async fn test_session_failure_is_reported() {
        let (ctx, sessions) = context();

        let store = crate::shop::InMemoryShopStore::new();
        store.insert(Shop::new(2, SHOP_DOMAIN, ""));
        let ctx = JobContext::new(Arc::new(store), ctx.sessions.clone());

        let err = perform(&ctx, &envelope(JobKind::ShopRedact, SHOP_DOMAIN))
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Session(SessionError::MissingToken(_))));
        assert_eq!(sessions.deactivations(), 0);
    }

    #[tokio::test]
    async fn test_delivery_for_known_shop_is_acked() {
        let (ctx, sessions) = context();
        let body = serde_json::to_vec(&envelope(JobKind::CustomersRedact, SHOP_DOMAIN)).unwrap();

        assert!(run_delivery(&ctx, "msg-1", &body).await);
        assert_eq!(sessions.deactivations(), 1);
    }

    #[tokio::test]
    async fn test_delivery_for_unknown_shop_is_rejected() {
        let (ctx, sessions) = context();
        let body =
            serde_json::to_vec(&envelope(JobKind::ShopRedact, "unknown.myshopify.com")).unwrap();

        assert!(!run_delivery(&ctx, "msg-2", &body).await);
        assert_eq!(sessions.activations(), 0);
    }

    #[tokio::test]
    async fn test_unparsable_delivery_is_rejected() {
        let (ctx, sessions) = context();

        assert!(!run_delivery(&ctx, "msg-3", b"\x00not a job").await);
        assert!(!run_delivery(&ctx, "msg-4", br#"{"job_class":"UnknownJob"}"#).await);
        assert_eq!(sessions.activations(), 0);
    }
}
