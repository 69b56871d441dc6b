//! Worker lifecycle control — pause, resume, graceful shutdown.

use crate::error::Result;
use crate::types::Event;

use super::Worker;

impl Worker {
    /// Pause job pickup
    ///
    /// The queue processor stops dequeuing new jobs; queued jobs stay where
    /// they are. In-flight tasks are never interrupted — they complete
    /// naturally, so no task record is left corrupted by the pause.
    /// Idempotent.
    pub fn pause(&self) {
        self.queue_state
            .paused
            .store(true, std::sync::atomic::Ordering::SeqCst);
        tracing::info!("Worker paused - no new jobs will be picked up");
    }

    /// Resume job pickup after a pause
    ///
    /// Idempotent; a no-op if the worker is not paused.
    pub fn resume(&self) {
        self.queue_state
            .paused
            .store(false, std::sync::atomic::Ordering::SeqCst);
        tracing::info!("Worker resumed");
    }

    /// Whether the worker is currently paused
    pub fn is_paused(&self) -> bool {
        self.queue_state
            .paused
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Gracefully shut down the worker
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new task submissions
    /// 2. Stops the queue processor (queued jobs are left undelivered)
    /// 3. Waits for in-flight tasks to complete with a timeout (30 seconds)
    ///
    /// A task still running when the timeout expires is left `processing`
    /// in the database; reconciling such tasks after a restart is a
    /// deployment concern, not something this core guesses at.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new submissions
        self.queue_state
            .accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);
        tracing::info!("Stopped accepting new jobs");

        // 2. Stop the queue processor loop
        self.queue_state.shutdown_token.cancel();

        // 3. Wait for in-flight tasks with a timeout
        let shutdown_timeout = std::time::Duration::from_secs(30);
        let wait_result =
            tokio::time::timeout(shutdown_timeout, self.wait_for_active_tasks()).await;

        match wait_result {
            Ok(()) => {
                tracing::info!("All in-flight tasks completed gracefully");
            }
            Err(_) => {
                tracing::warn!(
                    "Timeout waiting for in-flight tasks to complete, proceeding with shutdown"
                );
            }
        }

        // 4. Emit shutdown event
        self.emit_event(Event::Shutdown);

        // Database connections close when the last reference is dropped
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Wait for all in-flight tasks to complete
    ///
    /// This is a helper method used during shutdown to wait for active
    /// collection runs to finish their current work.
    async fn wait_for_active_tasks(&self) {
        loop {
            let active_count = {
                let active = self.queue_state.active_tasks.lock().await;
                active.len()
            };

            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "Waiting for in-flight tasks to complete");
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}
