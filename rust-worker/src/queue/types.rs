//! Queue message types.
//!
//! Every webhook becomes one [`JobEnvelope`] on the `shopify_webhook_jobs`
//! queue. The envelope names the job class to run, the shop it concerns and
//! the webhook payload exactly as received (minus routing keys).

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Queue name for webhook jobs.
pub const JOBS_QUEUE: &str = "shopify_webhook_jobs";

/// Opaque webhook payload, passed through unchanged from handler to job.
pub type WebhookPayload = Map<String, Value>;

/// Job types selected by the webhook endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    #[serde(rename = "ShopRedactJob")]
    ShopRedact,
    #[serde(rename = "CustomersRedactJob")]
    CustomersRedact,
    #[serde(rename = "CustomersDataRequestJob")]
    CustomersDataRequest,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [
        JobKind::ShopRedact,
        JobKind::CustomersRedact,
        JobKind::CustomersDataRequest,
    ];

    /// Job class name as written on the queue.
    pub fn class_name(self) -> &'static str {
        match self {
            JobKind::ShopRedact => "ShopRedactJob",
            JobKind::CustomersRedact => "CustomersRedactJob",
            JobKind::CustomersDataRequest => "CustomersDataRequestJob",
        }
    }

    /// Shopify webhook topic that triggers this job.
    pub fn topic(self) -> &'static str {
        match self {
            JobKind::ShopRedact => "shop/redact",
            JobKind::CustomersRedact => "customers/redact",
            JobKind::CustomersDataRequest => "customers/data_request",
        }
    }

    /// HTTP route that receives this webhook.
    pub fn route(self) -> &'static str {
        match self {
            JobKind::ShopRedact => "/webhooks/shop_redact",
            JobKind::CustomersRedact => "/webhooks/customers_redact",
            JobKind::CustomersDataRequest => "/webhooks/customers_data_request",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// One enqueued job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    /// Message identifier; the Shopify webhook id when one was sent
    pub job_id: String,
    /// Which job to run
    pub job_class: JobKind,
    /// Shop the webhook was sent for
    pub shop_domain: String,
    /// Webhook body without routing keys
    pub webhook: WebhookPayload,
    /// `X-Shopify-Topic` header, if present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// `X-Shopify-Webhook-Id` header, if present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
    /// Unix epoch milliseconds at enqueue time
    pub enqueued_at_ms: u64,
}

impl JobEnvelope {
    /// Build an envelope, deriving the job id from the webhook id.
    pub fn new(
        job_class: JobKind,
        shop_domain: String,
        webhook: WebhookPayload,
        topic: Option<String>,
        webhook_id: Option<String>,
    ) -> Self {
        let job_id = webhook_id
            .clone()
            .unwrap_or_else(|| format!("job-{:016x}", rand::random::<u64>()));

        let enqueued_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        Self {
            job_id,
            job_class,
            shop_domain,
            webhook,
            topic,
            webhook_id,
            enqueued_at_ms,
        }
    }
}
