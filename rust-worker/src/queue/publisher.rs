//! Async RabbitMQ publisher for enqueueing jobs.
//!
//! The publisher holds a fixed pool of connection slots sized by
//! `QUEUE_CONNECTIONS`. Each publish picks the next slot round robin, so
//! concurrent requests spread across connections instead of contending on one
//! channel. Slots connect lazily and reconnect after a failure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::types::{JobEnvelope, JOBS_QUEUE};
use super::JobQueue;

/// Async RabbitMQ publisher with a round-robin connection pool.
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

struct PublisherInner {
    url: String,
    slots: Vec<Slot>,
    next: AtomicUsize,
}

#[derive(Default)]
struct Slot {
    connection: RwLock<Option<Connection>>,
    channel: RwLock<Option<Channel>>,
}

impl Publisher {
    /// Create a publisher with a single connection.
    pub fn new(url: String) -> Self {
        Self::with_pool_size(url, 1)
    }

    /// Create a publisher with `pool_size` connections (at least one).
    pub fn with_pool_size(url: String, pool_size: usize) -> Self {
        let slots = (0..pool_size.max(1)).map(|_| Slot::default()).collect();

        Self {
            inner: Arc::new(PublisherInner {
                url,
                slots,
                next: AtomicUsize::new(0),
            }),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.inner.slots.len()
    }

    fn next_slot(&self) -> (usize, &Slot) {
        let index = self.inner.next.fetch_add(1, Ordering::Relaxed) % self.inner.slots.len();
        (index, &self.inner.slots[index])
    }

    /// Ensure the slot has a valid connection and channel.
    async fn ensure_connected(&self, index: usize, slot: &Slot) -> Result<Channel> {
        {
            let channel = slot.channel.read().await;
            if let Some(ch) = channel.as_ref() {
                if ch.status().connected() {
                    return Ok(ch.clone());
                }
            }
        }

        let mut connection = slot.connection.write().await;
        let mut channel = slot.channel.write().await;

        // Double-check after acquiring write lock
        if let Some(ch) = channel.as_ref() {
            if ch.status().connected() {
                return Ok(ch.clone());
            }
        }

        info!(slot = index, "rabbitmq_publisher_connecting");

        let conn = Connection::connect(&self.inner.url, ConnectionProperties::default())
            .await
            .context("Failed to connect to RabbitMQ")?;

        info!(slot = index, "rabbitmq_publisher_connected");

        let ch = conn
            .create_channel()
            .await
            .context("Failed to create channel")?;

        ch.confirm_select(ConfirmSelectOptions::default())
            .await
            .context("Failed to enable publisher confirms")?;

        ch.queue_declare(
            JOBS_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("Failed to declare jobs queue")?;

        info!(slot = index, queue = JOBS_QUEUE, "rabbitmq_queue_declared");

        if let Some(stale) = connection.replace(conn) {
            close_stale_connection(index, stale).await;
        }
        *channel = Some(ch.clone());

        Ok(ch)
    }

    /// Publish a job to the jobs queue and wait for the broker confirm.
    pub async fn publish_job(&self, job: &JobEnvelope) -> Result<()> {
        let (index, slot) = self.next_slot();
        let channel = self.ensure_connected(index, slot).await?;

        let body = serde_json::to_vec(job).context("Failed to serialize job")?;

        let confirmation = channel
            .basic_publish(
                "",
                JOBS_QUEUE,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_delivery_mode(2) // Persistent
                    .with_content_type("application/json".into())
                    .with_kind(job.job_class.class_name().into())
                    .with_message_id(job.job_id.clone().into()),
            )
            .await
            .context("Failed to publish to jobs queue")?
            .await
            .context("Failed to confirm publish")?;

        if confirmation.is_nack() {
            anyhow::bail!("Broker rejected job {}", job.job_id);
        }

        info!(
            queue = JOBS_QUEUE,
            slot = index,
            job_id = %job.job_id,
            job_class = %job.job_class,
            body_length = body.len(),
            "rabbitmq_job_published"
        );

        Ok(())
    }

    /// Close every connection gracefully.
    pub async fn shutdown(&self) {
        for (index, slot) in self.inner.slots.iter().enumerate() {
            let mut connection = slot.connection.write().await;
            let mut channel = slot.channel.write().await;

            if let Some(ch) = channel.take() {
                if let Err(e) = ch.close(200, "Normal shutdown").await {
                    warn!(slot = index, error = %e, "rabbitmq_channel_close_error");
                }
            }

            if let Some(conn) = connection.take() {
                if let Err(e) = conn.close(200, "Normal shutdown").await {
                    warn!(slot = index, error = %e, "rabbitmq_connection_close_error");
                }
            }
        }

        info!(pool_size = self.pool_size(), "rabbitmq_publisher_closed");
    }
}

/// Close a connection that is being replaced after a reconnect.
///
/// The broker may already have dropped it, so errors are only logged.
async fn close_stale_connection(index: usize, stale: Connection) {
    if !stale.status().connected() {
        info!(slot = index, "rabbitmq_stale_connection_already_closed");
        return;
    }

    match stale.close(200, "Replaced by reconnect").await {
        Ok(()) => info!(slot = index, "rabbitmq_stale_connection_closed"),
        Err(e) => warn!(slot = index, error = %e, "rabbitmq_stale_connection_close_error"),
    }
}

#[async_trait]
impl JobQueue for Publisher {
    async fn enqueue(&self, job: &JobEnvelope) -> Result<()> {
        self.publish_job(job).await
    }

    async fn close(&self) {
        self.shutdown().await;
    }
}
