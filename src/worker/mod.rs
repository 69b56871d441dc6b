//! Background worker consuming collection jobs.
//!
//! The `Worker` struct and its methods are organized by domain:
//! - [`queue_processor`] - Job consumption loop and task spawning
//! - [`control`] - Pause, resume, and graceful shutdown
//! - [`backoff`] - Job-level retry delay schedule
//!
//! One worker owns the whole pipeline: the job queue, the concurrency
//! limit, the shared API rate limiter, and the collection service that
//! executes each job. Job payloads carry only a task id; everything else is
//! read from the task record, so payload and state can never diverge.

mod backoff;
mod control;
mod queue_processor;


use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::api::ContentApi;
use crate::collection::CollectionService;
use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result, TaskError};
use crate::progress::{PhaseCounters, PhaseWeights, ProgressSnapshot};
use crate::rate_limiter::RateLimiter;
use crate::types::{CollectionJob, Event, TaskId, TaskStatus, TaskStatusInfo};

/// Job queue and in-flight tracking
#[derive(Clone)]
pub(crate) struct QueueState {
    /// FIFO job queue (re-deliveries are pushed to the back)
    pub(crate) queue: Arc<tokio::sync::Mutex<VecDeque<QueuedJob>>>,
    /// Semaphore limiting concurrent collection tasks (respects max_concurrent_tasks config)
    pub(crate) concurrent_limit: Arc<tokio::sync::Semaphore>,
    /// Tasks currently being collected (for shutdown draining)
    pub(crate) active_tasks: Arc<tokio::sync::Mutex<HashSet<TaskId>>>,
    /// Flag to indicate whether new jobs are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Operator pause flag: the processor stops picking up jobs while set
    pub(crate) paused: Arc<AtomicBool>,
    /// Cancellation signal for the queue processor loop
    pub(crate) shutdown_token: tokio_util::sync::CancellationToken,
}

/// One queued job delivery, with its attempt counter
#[derive(Debug, Clone, Copy)]
pub(crate) struct QueuedJob {
    pub(crate) job: CollectionJob,
    /// 1-based delivery attempt
    pub(crate) attempt: u32,
}

/// Main worker instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Worker {
    /// Database instance for persistence (wrapped in Arc for sharing across tasks)
    /// Public for integration tests to query task status
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Shared calls-per-minute limiter covering all concurrent jobs
    pub(crate) rate_limiter: RateLimiter,
    /// The collection service executing each job
    pub(crate) collection: Arc<CollectionService>,
    /// Validated phase weights, for on-demand progress snapshots
    pub(crate) weights: PhaseWeights,
    /// Job queue and in-flight tracking
    pub(crate) queue_state: QueueState,
}

impl Worker {
    /// Create a new Worker instance
    ///
    /// This initializes all core components:
    /// - Opens/creates the SQLite database and runs migrations
    /// - Validates the configured phase weights
    /// - Creates the shared rate limiter and the event broadcast channel
    ///
    /// The content API is injected so callers (and tests) control the
    /// external dependency; the database comes from configuration.
    pub async fn new(config: Config, api: Arc<dyn ContentApi>) -> Result<Self> {
        let weights = PhaseWeights::from_config(&config.collection)?;

        let db = Arc::new(Database::new(&config.persistence.database_path).await?);

        // Create broadcast channel with buffer size of 1000 events
        // This allows multiple subscribers to receive all events independently
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let rate_limiter = RateLimiter::new(config.worker.calls_per_minute);

        let collection = Arc::new(CollectionService::new(
            db.clone(),
            api,
            rate_limiter.clone(),
            config.collection.clone(),
            event_tx.clone(),
        )?);

        let queue_state = QueueState {
            queue: Arc::new(tokio::sync::Mutex::new(VecDeque::new())),
            concurrent_limit: Arc::new(tokio::sync::Semaphore::new(
                config.worker.max_concurrent_tasks,
            )),
            active_tasks: Arc::new(tokio::sync::Mutex::new(HashSet::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
            paused: Arc::new(AtomicBool::new(false)),
            shutdown_token: tokio_util::sync::CancellationToken::new(),
        };

        Ok(Self {
            db,
            event_tx,
            config: Arc::new(config),
            rate_limiter,
            collection,
            weights,
            queue_state,
        })
    }

    /// Subscribe to task lifecycle events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// Events are buffered, but if a subscriber falls behind by more than 1000 events,
    /// it will receive a `RecvError::Lagged` error.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Create a task for the given sources and enqueue its collection job
    ///
    /// The source list is stored verbatim (order preserved, duplicates
    /// preserved — duplicates are collected twice and converge in storage
    /// through the upserts).
    pub async fn submit_task(&self, sources: Vec<String>) -> Result<TaskId> {
        if !self
            .queue_state
            .accepting_new
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(Error::ShuttingDown);
        }

        let task_id = self.db.create_task(&sources).await?;
        self.enqueue_job(CollectionJob { task_id }).await?;
        Ok(task_id)
    }

    /// Enqueue a collection job for an existing task
    ///
    /// The payload is validated at the queue boundary: the task must exist
    /// and still be `pending`. This is the only shape of work the worker
    /// accepts.
    pub async fn enqueue_job(&self, job: CollectionJob) -> Result<()> {
        if !self
            .queue_state
            .accepting_new
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(Error::ShuttingDown);
        }

        let task = self
            .db
            .get_task(job.task_id)
            .await?
            .ok_or(Error::Task(TaskError::NotFound { id: job.task_id.0 }))?;

        let status = task.task_status();
        if status != TaskStatus::Pending {
            return Err(Error::Task(TaskError::InvalidState {
                id: job.task_id.0,
                operation: "enqueue".to_string(),
                current_state: status.to_string(),
            }));
        }

        let sources = task.sources()?;
        {
            let mut queue = self.queue_state.queue.lock().await;
            queue.push_back(QueuedJob { job, attempt: 1 });
        }

        self.emit_event(Event::TaskQueued {
            id: job.task_id,
            sources: sources.len(),
        });
        tracing::info!(
            task_id = job.task_id.0,
            sources = sources.len(),
            "Collection job enqueued"
        );
        Ok(())
    }

    /// Read one task's externally visible state: status, progress snapshot,
    /// errors, and submitted sources
    ///
    /// This is the read API for an embedding application's status endpoint.
    /// The progress snapshot is computed on demand from the checkpointed
    /// counters; a `completed` task always reports 100%.
    pub async fn task_status(&self, task_id: TaskId) -> Result<TaskStatusInfo> {
        let task = self
            .db
            .get_task(task_id)
            .await?
            .ok_or(Error::Task(TaskError::NotFound { id: task_id.0 }))?;

        let sources = task.sources()?;
        let status = task.task_status();

        let progress = if status == TaskStatus::Completed {
            ProgressSnapshot::completed(&self.weights)
        } else {
            let cap = u64::from(self.config.collection.posts_per_source);
            let groups_total = sources.len() as u64;
            let counters = PhaseCounters {
                groups_total,
                groups_processed: task.groups_processed as u64,
                posts_total: groups_total * cap,
                posts_processed: task.posts_collected as u64,
                comments_total: groups_total * cap,
                comments_processed: task.comment_listings as u64,
            };
            ProgressSnapshot::compute(&self.weights, &counters)
        };

        Ok(TaskStatusInfo {
            status,
            progress,
            errors: task.errors()?,
            sources,
        })
    }

    /// Adjust the shared API call budget at runtime
    ///
    /// Takes effect immediately for all in-flight and future jobs.
    pub fn set_rate_limit(&self, calls_per_minute: Option<u32>) {
        self.rate_limiter.set_limit(calls_per_minute);
        tracing::info!(?calls_per_minute, "API rate limit updated");
    }

    /// Number of jobs waiting in the queue (not counting in-flight ones)
    pub async fn queue_depth(&self) -> usize {
        self.queue_state.queue.lock().await.len()
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
