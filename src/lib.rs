//! # vk-harvest
//!
//! Backend library for bulk collection of VK community wall content.
//!
//! A submitted batch of community ids becomes a collection task. A background
//! worker walks each task through three sequential phases — source
//! validation, post listing, comment listing — against the rate-limited VK
//! API, tracks phase-weighted progress, performs idempotent bulk upserts of
//! the results into SQLite, and finishes the task in a terminal state with
//! aggregated per-source errors.
//!
//! ## Design Philosophy
//!
//! vk-harvest is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Predictable** - Sources are processed sequentially per task; all API
//!   traffic flows through one shared calls-per-minute limiter
//! - **Observable mid-run** - Task state and metrics are checkpointed to the
//!   database after every source
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use vk_harvest::{Worker, Config, api::VkApiClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let api = Arc::new(VkApiClient::new(
//!         "service-token".to_string(),
//!         config.api.clone(),
//!     )?);
//!
//!     let worker = Worker::new(config, api).await?;
//!     worker.start_queue_processor();
//!
//!     // Subscribe to events
//!     let mut events = worker.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Create a task for two communities and enqueue it
//!     let task_id = worker.submit_task(vec!["-12345".into(), "67890".into()]).await?;
//!     println!("collecting task {task_id}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// VK API client
pub mod api;
/// Collection pipeline for a single task
pub mod collection;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Phase-weighted progress calculation
pub mod progress;
/// Shared API call rate limiting
pub mod rate_limiter;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Background worker consuming collection jobs
pub mod worker;

// Re-export commonly used types
pub use api::{ContentApi, VkApiClient};
pub use collection::CollectionService;
pub use config::{BackoffPolicy, Config, RetryConfig};
pub use db::Database;
pub use error::{ApiError, DatabaseError, Error, Result, TaskError};
pub use progress::{PhaseCounters, PhaseWeights, ProgressSnapshot};
pub use rate_limiter::RateLimiter;
pub use types::{
    CollectionJob, Comment, Event, Phase, Post, TaskId, TaskMetrics, TaskStatus, TaskStatusInfo,
};
pub use worker::Worker;

/// Helper function to run the worker with graceful signal handling.
///
/// Waits for a termination signal and then calls the worker's `shutdown()`
/// method, which stops picking up new jobs and waits for in-flight tasks.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use vk_harvest::{Worker, Config, api::VkApiClient, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let api = Arc::new(VkApiClient::new("token".to_string(), config.api.clone())?);
///     let worker = Worker::new(config, api).await?;
///     worker.start_queue_processor();
///
///     // Run with automatic signal handling
///     run_with_shutdown(worker).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(worker: Worker) -> Result<()> {
    wait_for_signal().await;
    worker.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
