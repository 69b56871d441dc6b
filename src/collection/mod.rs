//! Collection pipeline for a single task.
//!
//! [`CollectionService::run`] drives one task through its whole lifecycle:
//! transition to `processing`, walk every submitted source through post and
//! comment collection, checkpoint metrics after each source, and finish in
//! a terminal state. Anything attributable to one source or one post is
//! swallowed into the task's error list; anything systemic (storage outage)
//! aborts the run, marks the task failed, and is re-thrown so the worker
//! can decide on job-level retry.

mod source;


pub use source::normalize_source;

use std::sync::Arc;

use crate::api::ContentApi;
use crate::config::CollectionConfig;
use crate::db::{Database, SourceCheckpoint};
use crate::error::{Error, Result, TaskError};
use crate::progress::{PhaseCounters, PhaseWeights, ProgressSnapshot};
use crate::rate_limiter::RateLimiter;
use crate::types::{Event, Post, TaskId, TaskStatus};

/// Orchestrates the three-phase collection walk for one task at a time
///
/// All dependencies are injected at construction: the content API (a trait,
/// so tests can script it), the result store, and the worker-wide rate
/// limiter that every external call must pass through.
pub struct CollectionService {
    db: Arc<Database>,
    api: Arc<dyn ContentApi>,
    rate_limiter: RateLimiter,
    config: CollectionConfig,
    weights: PhaseWeights,
    event_tx: tokio::sync::broadcast::Sender<Event>,
}

/// Outcome of collecting one source: checkpoint deltas plus the errors to
/// record for it
struct SourceOutcome {
    checkpoint: SourceCheckpoint,
    errors: Vec<String>,
}

impl CollectionService {
    /// Create a new collection service
    ///
    /// Fails if the configured phase weights do not sum to 1.0.
    pub fn new(
        db: Arc<Database>,
        api: Arc<dyn ContentApi>,
        rate_limiter: RateLimiter,
        config: CollectionConfig,
        event_tx: tokio::sync::broadcast::Sender<Event>,
    ) -> Result<Self> {
        let weights = PhaseWeights::from_config(&config)?;
        Ok(Self {
            db,
            api,
            rate_limiter,
            config,
            weights,
            event_tx,
        })
    }

    /// Run the full collection lifecycle for one task
    ///
    /// On return the task is in a terminal state: `completed` if every
    /// source went through cleanly, `failed` if any per-source error was
    /// recorded or a systemic error aborted the walk. A systemic error is
    /// additionally re-thrown so the caller can apply job-level retry.
    ///
    /// Fails immediately (without touching task state) if the task does not
    /// exist or its stored source list is unreadable.
    pub async fn run(&self, task_id: TaskId) -> Result<()> {
        let task = self
            .db
            .get_task(task_id)
            .await?
            .ok_or(Error::Task(TaskError::NotFound { id: task_id.0 }))?;
        let sources = task.sources()?;

        self.db.mark_task_started(task_id).await?;
        self.emit_event(Event::TaskStarted { id: task_id });
        tracing::info!(
            task_id = task_id.0,
            sources = sources.len(),
            "Collection started"
        );

        match self.collect_all(task_id, &sources).await {
            Ok(error_count) => {
                let status = if error_count > 0 {
                    TaskStatus::Failed
                } else {
                    TaskStatus::Completed
                };
                self.db.mark_task_finished(task_id, status).await?;

                let metrics = match self.db.get_task(task_id).await? {
                    Some(row) => row.metrics()?,
                    None => crate::types::TaskMetrics::default(),
                };

                if status == TaskStatus::Completed {
                    self.emit_event(Event::TaskCompleted {
                        id: task_id,
                        posts_collected: metrics.posts_collected,
                        comments_collected: metrics.comments_collected,
                    });
                    tracing::info!(
                        task_id = task_id.0,
                        posts_collected = metrics.posts_collected,
                        comments_collected = metrics.comments_collected,
                        "Collection completed"
                    );
                } else {
                    self.emit_event(Event::TaskFailed {
                        id: task_id,
                        error_count,
                    });
                    tracing::warn!(
                        task_id = task_id.0,
                        error_count,
                        posts_collected = metrics.posts_collected,
                        comments_collected = metrics.comments_collected,
                        "Collection finished with errors"
                    );
                }
                Ok(())
            }
            Err(e) => {
                // Systemic failure: record it, force the terminal state,
                // then re-throw for the worker's retry policy
                let message = format!("General error in run: {e}");
                tracing::error!(task_id = task_id.0, error = %e, "Collection run aborted");

                if let Err(record_err) = self.db.append_task_errors(task_id, &[message]).await {
                    tracing::error!(
                        task_id = task_id.0,
                        error = %record_err,
                        "Failed to record fatal error on task"
                    );
                }
                if let Err(record_err) = self
                    .db
                    .mark_task_finished(task_id, TaskStatus::Failed)
                    .await
                {
                    tracing::error!(
                        task_id = task_id.0,
                        error = %record_err,
                        "Failed to mark task failed"
                    );
                }

                self.emit_event(Event::TaskFailed {
                    id: task_id,
                    error_count: 1,
                });
                Err(e)
            }
        }
    }

    /// Walk every source in submitted order, checkpointing after each
    ///
    /// Returns the number of per-source/per-post errors recorded. Only
    /// storage-layer failures propagate out of here.
    async fn collect_all(&self, task_id: TaskId, sources: &[String]) -> Result<usize> {
        let cap = self.config.posts_per_source as u64;
        let mut counters = PhaseCounters {
            groups_total: sources.len() as u64,
            posts_total: sources.len() as u64 * cap,
            comments_total: sources.len() as u64 * cap,
            ..PhaseCounters::default()
        };
        let mut error_count = 0usize;

        for raw_source in sources {
            let outcome = self.collect_source(task_id, raw_source, &mut counters).await?;
            counters.groups_processed += 1;
            error_count += outcome.errors.len();

            // Checkpoint: progress must be externally observable mid-run
            self.db.checkpoint_source(task_id, &outcome.checkpoint).await?;
            self.db.append_task_errors(task_id, &outcome.errors).await?;

            for warning in counters.validate() {
                tracing::warn!(task_id = task_id.0, warning = %warning, "Progress counters out of range");
            }

            let snapshot = ProgressSnapshot::compute(&self.weights, &counters);
            self.emit_event(Event::SourceProcessed {
                id: task_id,
                source: raw_source.clone(),
                posts: outcome.checkpoint.posts,
                comments: outcome.checkpoint.comments,
                percentage: snapshot.percentage,
            });
            tracing::debug!(
                task_id = task_id.0,
                source = %raw_source,
                posts = outcome.checkpoint.posts,
                comments = outcome.checkpoint.comments,
                percentage = snapshot.percentage,
                "Source processed"
            );
        }

        Ok(error_count)
    }

    /// Collect one source: list its wall posts (first page, capped), store
    /// them, then list and store the comments of every kept post
    ///
    /// Per-source and per-post API failures are captured as error strings in
    /// the outcome; only storage failures propagate as `Err`.
    async fn collect_source(
        &self,
        task_id: TaskId,
        raw_source: &str,
        counters: &mut PhaseCounters,
    ) -> Result<SourceOutcome> {
        let mut outcome = SourceOutcome {
            checkpoint: SourceCheckpoint::default(),
            errors: Vec::new(),
        };

        let group_id = match normalize_source(raw_source) {
            Ok(id) => id,
            Err(e) => {
                outcome
                    .errors
                    .push(format!("Error processing source {raw_source}: {e}"));
                return Ok(outcome);
            }
        };

        self.rate_limiter.acquire().await;
        let posts = match self.api.fetch_posts(group_id).await {
            Ok(posts) => posts,
            Err(e) => {
                outcome
                    .errors
                    .push(format!("Error processing source {raw_source}: {e}"));
                return Ok(outcome);
            }
        };

        // Cap the per-source fan-out before any detail fetching
        let capped: Vec<Post> = posts
            .into_iter()
            .take(self.config.posts_per_source as usize)
            .collect();

        self.db.upsert_posts(task_id, &capped).await?;
        counters.posts_processed += capped.len() as u64;
        outcome.checkpoint.posts = capped.len() as i64;

        for post in &capped {
            self.rate_limiter.acquire().await;
            match self.api.fetch_comments(group_id, post.id).await {
                Ok(comments) => {
                    self.db.upsert_comments(&comments).await?;
                    outcome.checkpoint.comments += comments.len() as i64;
                }
                Err(e) => {
                    // A detail-fetch failure never aborts the source
                    outcome.errors.push(format!(
                        "Error getting comments for source {raw_source}, post {}: {e}",
                        post.id
                    ));
                }
            }
            counters.comments_processed += 1;
            outcome.checkpoint.comment_listings += 1;
        }

        Ok(outcome)
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
