//! Queue module for job enqueueing.
//!
//! This module provides:
//! - The [`JobEnvelope`] message format
//! - The [`JobQueue`] seam used by the web handlers
//! - An AMQP [`Publisher`] and an [`InMemoryQueue`] for the test environment
//!
//! ## Architecture
//!
//! ```text
//! Web Server → shopify_webhook_jobs queue → Worker
//! ```

pub mod memory;
pub mod publisher;
pub mod types;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::QueueBackend;

pub use memory::InMemoryQueue;
pub use publisher::Publisher;
pub use types::{JobEnvelope, JobKind, WebhookPayload, JOBS_QUEUE};

/// Anything jobs can be enqueued on.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue one job. Returns once the backend has accepted it.
    async fn enqueue(&self, job: &JobEnvelope) -> Result<()>;

    /// Release backend resources.
    async fn close(&self) {}
}

/// Build the queue selected by the configuration.
pub fn connect(backend: &QueueBackend) -> Arc<dyn JobQueue> {
    match backend {
        QueueBackend::Amqp { url, pool_size } => {
            Arc::new(Publisher::with_pool_size(url.clone(), *pool_size))
        }
        QueueBackend::InMemory => Arc::new(InMemoryQueue::new()),
    }
}
