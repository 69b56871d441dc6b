//! Queue processor — consumes collection jobs and spawns their runs.

use std::time::Duration;

use super::{QueuedJob, Worker};
use crate::types::Event;

/// Interval between queue polling attempts when the queue is empty or paused
const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl Worker {
    /// Start the queue processor task
    ///
    /// This method spawns a background task that continuously:
    /// 1. Waits while the worker is paused
    /// 2. Pops the next job off the queue (FIFO)
    /// 3. Acquires a permit from the concurrency limiter (respects max_concurrent_tasks)
    /// 4. Spawns the collection run for that job
    /// 5. Repeats until shutdown
    ///
    /// Each spawned run processes its task's sources strictly sequentially;
    /// the only cross-job coordination is the shared rate limiter and the
    /// concurrency semaphore.
    pub fn start_queue_processor(&self) -> tokio::task::JoinHandle<()> {
        let worker = self.clone();
        let shutdown = self.queue_state.shutdown_token.clone();

        tokio::spawn(async move {
            loop {
                if shutdown.is_cancelled() {
                    break;
                }

                // Operator pause: leave queued jobs where they are
                if worker
                    .queue_state
                    .paused
                    .load(std::sync::atomic::Ordering::SeqCst)
                {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(QUEUE_POLL_INTERVAL) => continue,
                    }
                }

                let queued_item = {
                    let mut queue = worker.queue_state.queue.lock().await;
                    queue.pop_front()
                };

                if let Some(item) = queued_item {
                    // Acquire a permit (blocks while at max concurrent tasks)
                    let permit = tokio::select! {
                        _ = shutdown.cancelled() => {
                            // Re-push so the job isn't lost on shutdown
                            let mut queue = worker.queue_state.queue.lock().await;
                            queue.push_front(item);
                            break;
                        }
                        permit = worker.queue_state.concurrent_limit.clone().acquire_owned() => {
                            match permit {
                                Ok(p) => p,
                                Err(_) => {
                                    let mut queue = worker.queue_state.queue.lock().await;
                                    queue.push_front(item);
                                    break;
                                }
                            }
                        }
                    };

                    {
                        let mut active = worker.queue_state.active_tasks.lock().await;
                        active.insert(item.job.task_id);
                    }

                    let job_worker = worker.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        job_worker.run_collection_job(item).await;
                        let mut active = job_worker.queue_state.active_tasks.lock().await;
                        active.remove(&item.job.task_id);
                    });
                } else {
                    // Queue is empty, wait a bit before checking again
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(QUEUE_POLL_INTERVAL) => {}
                    }
                }
            }

            tracing::debug!("Queue processor stopped");
        })
    }

    /// Execute one job delivery and translate its outcome into queue
    /// behavior: success and fatal errors finish the job, transient errors
    /// schedule a re-delivery with backoff
    async fn run_collection_job(&self, item: QueuedJob) {
        let task_id = item.job.task_id;

        match self.collection.run(task_id).await {
            Ok(()) => {
                // Task reached a terminal state; nothing more to do
            }
            Err(e) if e.is_transient() && item.attempt < self.config.worker.backoff.max_attempts => {
                // The task row is already marked failed; a re-delivery will
                // restart its lifecycle from the top
                let delay =
                    super::backoff::delay_for_attempt(&self.config.worker.backoff, item.attempt);

                tracing::warn!(
                    task_id = task_id.0,
                    error = %e,
                    attempt = item.attempt,
                    max_attempts = self.config.worker.backoff.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Collection job failed, scheduling re-delivery"
                );
                self.emit_event(Event::JobRetryScheduled {
                    id: task_id,
                    attempt: item.attempt,
                    delay_ms: delay.as_millis() as u64,
                });

                let worker = self.clone();
                let retry = QueuedJob {
                    job: item.job,
                    attempt: item.attempt + 1,
                };
                tokio::spawn(async move {
                    tokio::select! {
                        _ = worker.queue_state.shutdown_token.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {
                            let mut queue = worker.queue_state.queue.lock().await;
                            queue.push_back(retry);
                        }
                    }
                });
            }
            Err(e) => {
                // Fatal, or retry budget exhausted. The task is already
                // recorded as failed by the collection service, so the job
                // just ends here.
                tracing::error!(
                    task_id = task_id.0,
                    error = %e,
                    attempt = item.attempt,
                    transient = e.is_transient(),
                    "Collection job failed permanently"
                );
            }
        }
    }
}
