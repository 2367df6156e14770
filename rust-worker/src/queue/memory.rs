//! Process-local job queue.
//!
//! Used in the test environment, where no broker is configured. Jobs are
//! recorded in enqueue order and can be inspected or drained.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::types::JobEnvelope;
use super::JobQueue;

/// In-memory queue that records every enqueued job.
#[derive(Clone, Default)]
pub struct InMemoryQueue {
    jobs: Arc<Mutex<Vec<JobEnvelope>>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all jobs currently held.
    pub fn jobs(&self) -> Vec<JobEnvelope> {
        self.lock().clone()
    }

    /// Remove and return all jobs currently held.
    pub fn drain(&self) -> Vec<JobEnvelope> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<JobEnvelope>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn enqueue(&self, job: &JobEnvelope) -> Result<()> {
        self.lock().push(job.clone());

        info!(
            job_id = %job.job_id,
            job_class = %job.job_class,
            shop_domain = %job.shop_domain,
            "memory_queue_enqueued"
        );

        Ok(())
    }
}
