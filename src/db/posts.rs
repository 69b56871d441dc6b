//! Idempotent bulk upserts of wall posts.

use crate::error::DatabaseError;
use crate::types::{Post, TaskId};
use crate::{Error, Result};

use super::{Database, PostRow};

impl Database {
    /// Bulk-upsert wall posts for a task, keyed by `(task_id, post_id)`
    ///
    /// On conflict the content, counters, and timestamp fields are
    /// refreshed, so re-collecting the same post converges to one row
    /// reflecting the latest values. An empty list is a no-op.
    pub async fn upsert_posts(&self, task_id: TaskId, posts: &[Post]) -> Result<()> {
        if posts.is_empty() {
            return Ok(());
        }

        let now = chrono::Utc::now().timestamp();

        for post in posts {
            sqlx::query(
                r#"
                INSERT INTO posts (
                    task_id, post_id, group_id, text, likes, reposts,
                    posted_at, collected_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(task_id, post_id) DO UPDATE SET
                    group_id = excluded.group_id,
                    text = excluded.text,
                    likes = excluded.likes,
                    reposts = excluded.reposts,
                    posted_at = excluded.posted_at,
                    collected_at = excluded.collected_at
                "#,
            )
            .bind(task_id)
            .bind(post.id)
            .bind(post.group_id)
            .bind(&post.text)
            .bind(post.likes)
            .bind(post.reposts)
            .bind(post.posted_at.timestamp())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to upsert post {} for task {}: {}",
                    post.id, task_id, e
                )))
            })?;
        }

        Ok(())
    }

    /// Get all posts collected for a task, in external-id order
    pub async fn get_posts_for_task(&self, task_id: TaskId) -> Result<Vec<PostRow>> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT
                id, task_id, post_id, group_id, text, likes, reposts,
                posted_at, collected_at
            FROM posts
            WHERE task_id = ?
            ORDER BY post_id ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get posts for task: {}",
                e
            )))
        })?;

        Ok(rows)
    }
}
