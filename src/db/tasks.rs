//! Task CRUD operations and incremental metrics checkpoints.

use crate::error::DatabaseError;
use crate::types::{TaskId, TaskStatus};
use crate::{Error, Result};

use super::{Database, TaskRow};

impl Database {
    /// Insert a new task in `pending` state with zeroed metrics
    ///
    /// The submitted source list is stored verbatim: order preserved,
    /// duplicates preserved.
    pub async fn create_task(&self, sources: &[String]) -> Result<TaskId> {
        let now = chrono::Utc::now().timestamp();
        let sources_json = serde_json::to_string(sources)?;

        let result = sqlx::query(
            r#"
            INSERT INTO tasks (
                sources, status, posts_collected, comments_collected, errors, created_at
            ) VALUES (?, ?, 0, 0, '[]', ?)
            "#,
        )
        .bind(&sources_json)
        .bind(TaskStatus::Pending.to_i32())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert task: {}",
                e
            )))
        })?;

        Ok(TaskId(result.last_insert_rowid()))
    }

    /// Get a task by ID
    pub async fn get_task(&self, id: TaskId) -> Result<Option<TaskRow>> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT
                id, sources, status, posts_collected, comments_collected,
                groups_processed, comment_listings, errors,
                created_at, started_at, finished_at
            FROM tasks
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get task: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// List all tasks, newest first
    pub async fn list_tasks(&self) -> Result<Vec<TaskRow>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT
                id, sources, status, posts_collected, comments_collected,
                groups_processed, comment_listings, errors,
                created_at, started_at, finished_at
            FROM tasks
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list tasks: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// List tasks with a specific status
    pub async fn list_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<TaskRow>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT
                id, sources, status, posts_collected, comments_collected,
                groups_processed, comment_listings, errors,
                created_at, started_at, finished_at
            FROM tasks
            WHERE status = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(status.to_i32())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list tasks by status: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Mark a task as processing and stamp `started_at`
    ///
    /// Errors with [`DatabaseError::NotFound`] if the task does not exist.
    pub async fn mark_task_started(&self, id: TaskId) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "UPDATE tasks SET status = ?, started_at = ? WHERE id = ?",
        )
        .bind(TaskStatus::Processing.to_i32())
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to mark task started: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "Task {} not found",
                id
            ))));
        }

        Ok(())
    }

    /// Move a task to a terminal state and stamp `finished_at`
    ///
    /// Errors with [`DatabaseError::NotFound`] if the task does not exist.
    pub async fn mark_task_finished(&self, id: TaskId, status: TaskStatus) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "UPDATE tasks SET status = ?, finished_at = ? WHERE id = ?",
        )
        .bind(status.to_i32())
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to mark task finished: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "Task {} not found",
                id
            ))));
        }

        Ok(())
    }

    /// Apply one source's checkpoint: increment content counters and
    /// advance the per-phase progress counters
    ///
    /// This is the per-source checkpoint write: counters in the row only
    /// ever grow, so an observer polling the task sees monotonically
    /// non-decreasing metrics mid-run.
    pub async fn checkpoint_source(
        &self,
        id: TaskId,
        delta: &super::SourceCheckpoint,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET posts_collected = posts_collected + ?,
                comments_collected = comments_collected + ?,
                groups_processed = groups_processed + 1,
                comment_listings = comment_listings + ?
            WHERE id = ?
            "#,
        )
        .bind(delta.posts)
        .bind(delta.comments)
        .bind(delta.comment_listings)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to checkpoint task progress: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "Task {} not found",
                id
            ))));
        }

        Ok(())
    }

    /// Append error messages to a task's error list
    ///
    /// The list is append-only; existing entries are never rewritten.
    pub async fn append_task_errors(&self, id: TaskId, new_errors: &[String]) -> Result<()> {
        if new_errors.is_empty() {
            return Ok(());
        }

        let row = self.get_task(id).await?.ok_or_else(|| {
            Error::Database(DatabaseError::NotFound(format!("Task {} not found", id)))
        })?;

        let mut errors = row.errors()?;
        errors.extend_from_slice(new_errors);
        let errors_json = serde_json::to_string(&errors)?;

        sqlx::query("UPDATE tasks SET errors = ? WHERE id = ?")
            .bind(&errors_json)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to append task errors: {}",
                    e
                )))
            })?;

        Ok(())
    }
}
