//! Shopify base app - mandatory webhook handling.
//!
//! This library provides shared modules for the two binaries:
//! - `shopify-base-web`: Thin web server that verifies and enqueues webhooks
//! - `shopify-base-worker`: Worker that runs the queued jobs
//!
//! ## Architecture
//!
//! ```text
//! Shopify → Web Server → shopify_webhook_jobs → Worker → Shop session
//! ```

pub mod config;
pub mod db;
pub mod jobs;
pub mod queue;
pub mod shop;
pub mod web;

// Re-export commonly used types
pub use config::{Config, Environment, QueueBackend};
pub use jobs::{JobContext, JobError};
pub use queue::{InMemoryQueue, JobEnvelope, JobKind, JobQueue, Publisher, JOBS_QUEUE};
pub use shop::{Shop, ShopStore, ShopifyApiScope};
pub use web::AppState;
