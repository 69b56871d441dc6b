//! Database layer for vk-harvest
//!
//! Handles SQLite persistence for tasks, posts, and comments.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`tasks`] — Task CRUD and incremental metrics checkpoints
//! - [`posts`] — Idempotent bulk upserts of wall posts
//! - [`comments`] — Idempotent bulk upserts of comments
//!
//! All writes of collected content go through natural-key upserts, so two
//! concurrent attempts to record the same external item converge to one row.

use crate::error::{DatabaseError, Error, Result};
use crate::types::{TaskMetrics, TaskStatus};
use sqlx::{FromRow, sqlite::SqlitePool};

mod comments;
mod migrations;
mod posts;
mod tasks;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

/// Database handle wrapping a SQLite connection pool
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

/// Per-source checkpoint deltas written after each source completes
///
/// All fields are increments; the checkpoint also advances the
/// sources-processed counter by one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceCheckpoint {
    /// Posts stored for this source
    pub posts: i64,
    /// Comments stored for this source
    pub comments: i64,
    /// Posts whose comment listing was attempted for this source
    pub comment_listings: i64,
}

/// Task record from database
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    /// Unique database ID
    pub id: i64,
    /// JSON array of the raw submitted source identifiers
    pub sources: String,
    /// Current status (0=pending, 1=processing, 2=completed, 3=failed)
    pub status: i32,
    /// Wall posts stored so far
    pub posts_collected: i64,
    /// Comments stored so far
    pub comments_collected: i64,
    /// Sources fully processed so far
    pub groups_processed: i64,
    /// Posts whose comment listing has completed
    pub comment_listings: i64,
    /// JSON array of accumulated error messages
    pub errors: String,
    /// Unix timestamp when the task was created
    pub created_at: i64,
    /// Unix timestamp when collection started
    pub started_at: Option<i64>,
    /// Unix timestamp when the task reached a terminal state
    pub finished_at: Option<i64>,
}

impl TaskRow {
    /// Decode the submitted source identifiers from their JSON column
    pub fn sources(&self) -> Result<Vec<String>> {
        serde_json::from_str(&self.sources).map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Task {} has an unreadable sources column: {}",
                self.id, e
            )))
        })
    }

    /// Decode the accumulated error list from its JSON column
    pub fn errors(&self) -> Result<Vec<String>> {
        serde_json::from_str(&self.errors).map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Task {} has an unreadable errors column: {}",
                self.id, e
            )))
        })
    }

    /// Current status as the typed enum
    pub fn task_status(&self) -> TaskStatus {
        TaskStatus::from_i32(self.status)
    }

    /// Assemble the aggregated metrics view of this row
    pub fn metrics(&self) -> Result<TaskMetrics> {
        Ok(TaskMetrics {
            posts_collected: self.posts_collected,
            comments_collected: self.comments_collected,
            errors: self.errors()?,
        })
    }
}

/// Wall post record from database
#[derive(Debug, Clone, FromRow)]
pub struct PostRow {
    /// Unique database ID
    pub id: i64,
    /// Task this post was collected for
    pub task_id: i64,
    /// External post id (unique within the owning community)
    pub post_id: i64,
    /// Owning community id, canonical positive form
    pub group_id: i64,
    /// Post body text
    pub text: String,
    /// Like count at collection time
    pub likes: i64,
    /// Repost count at collection time
    pub reposts: i64,
    /// Unix timestamp of publication
    pub posted_at: i64,
    /// Unix timestamp of the (most recent) collection
    pub collected_at: i64,
}

/// Comment record from database
#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    /// Unique database ID
    pub id: i64,
    /// External id of the post this comment belongs to
    pub post_id: i64,
    /// External comment id
    pub comment_id: i64,
    /// Author id
    pub author_id: i64,
    /// Comment body text
    pub text: String,
    /// Like count at collection time
    pub likes: i64,
    /// Unix timestamp of publication
    pub posted_at: i64,
    /// Unix timestamp of the (most recent) collection
    pub collected_at: i64,
}
