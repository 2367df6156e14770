//! RabbitMQ consumer module using lapin.
//!
//! This module handles connecting to RabbitMQ, consuming messages from the
//! shopify_webhook_jobs queue, and spawning an async task to run each job
//! concurrently.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use lapin::{
    options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, QueueDeclareOptions},
    types::FieldTable,
    Connection, ConnectionProperties,
};
use tokio::signal;
use tracing::{error, info, warn};

use shopify_base::{jobs, JobContext, JOBS_QUEUE};

/// Run the RabbitMQ consumer.
///
/// This function:
/// 1. Connects to RabbitMQ using the configured URL
/// 2. Sets up QoS so at most `concurrency` jobs are in flight
/// 3. Declares the queue (idempotent operation)
/// 4. Starts consuming messages, spawning a task for each
/// 5. Handles graceful shutdown on SIGINT/SIGTERM
///
/// Successful jobs are acked. Failed or unparsable jobs are rejected without
/// requeue, leaving redelivery to the broker's dead-letter policy.
pub async fn run(url: &str, concurrency: usize, ctx: JobContext) -> Result<()> {
    let ctx = Arc::new(ctx);

    // Connect to RabbitMQ
    info!(url_length = url.len(), "rabbitmq_connecting");

    let conn = Connection::connect(url, ConnectionProperties::default())
        .await
        .context("Failed to connect to RabbitMQ")?;

    info!("rabbitmq_connected");

    // Create a channel
    let channel = conn.create_channel().await.context("Failed to create channel")?;

    info!("rabbitmq_channel_created");

    let prefetch_count = u16::try_from(concurrency).unwrap_or(u16::MAX);
    channel
        .basic_qos(prefetch_count, BasicQosOptions::default())
        .await
        .context("Failed to set QoS")?;

    info!(prefetch_count = prefetch_count, "rabbitmq_qos_set");

    // Declare the queue (durable to match the publisher)
    channel
        .queue_declare(
            JOBS_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("Failed to declare queue")?;

    info!(queue = JOBS_QUEUE, "rabbitmq_queue_declared");

    // Start consuming messages
    let mut consumer = channel
        .basic_consume(
            JOBS_QUEUE,
            "shopify-base-worker",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .context("Failed to start consumer")?;

    info!(queue = JOBS_QUEUE, "rabbitmq_consumer_started");
    info!("worker_ready");

    // Clone channel for use in message handler
    let channel = Arc::new(channel);

    // Create shutdown signal future
    let shutdown = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT"),
            _ = terminate => info!("Received SIGTERM"),
        }
    };

    // Pin the shutdown future
    tokio::pin!(shutdown);

    // Process messages until shutdown
    loop {
        tokio::select! {
            // Check for shutdown signal
            _ = &mut shutdown => {
                info!("worker_stopping");
                break;
            }
            // Process next message
            delivery = consumer.next() => {
                match delivery {
                    Some(Ok(delivery)) => {
                        let delivery_tag = delivery.delivery_tag;
                        let message_id = delivery
                            .properties
                            .message_id()
                            .as_ref()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "unknown".to_string());

                        info!(
                            queue = JOBS_QUEUE,
                            message_id = %message_id,
                            delivery_tag = delivery_tag,
                            redelivered = delivery.redelivered,
                            "rabbitmq_job_received"
                        );

                        // Clone resources for the spawned task
                        let ctx = Arc::clone(&ctx);
                        let channel = Arc::clone(&channel);

                        tokio::spawn(async move {
                            let acked = jobs::run_delivery(&ctx, &message_id, &delivery.data).await;

                            if acked {
                                if let Err(e) = channel
                                    .basic_ack(delivery_tag, BasicAckOptions::default())
                                    .await
                                {
                                    error!(
                                        delivery_tag = delivery_tag,
                                        error = %e,
                                        "rabbitmq_ack_failed"
                                    );
                                } else {
                                    info!(
                                        queue = JOBS_QUEUE,
                                        message_id = %message_id,
                                        "rabbitmq_job_completed"
                                    );
                                }
                            } else if let Err(nack_err) = channel
                                .basic_nack(
                                    delivery_tag,
                                    BasicNackOptions {
                                        requeue: false,
                                        ..Default::default()
                                    },
                                )
                                .await
                            {
                                error!(
                                    delivery_tag = delivery_tag,
                                    error = %nack_err,
                                    "rabbitmq_nack_failed"
                                );
                            }
                        });
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "rabbitmq_delivery_error");
                    }
                    None => {
                        warn!("rabbitmq_consumer_closed");
                        break;
                    }
                }
            }
        }
    }

    info!("worker_shutdown_complete");
    Ok(())
}
