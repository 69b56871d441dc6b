//! Idempotent bulk upserts of comments.

use crate::error::DatabaseError;
use crate::types::Comment;
use crate::{Error, Result};

use super::{CommentRow, Database};

impl Database {
    /// Bulk-upsert comments, keyed by `(post_id, comment_id)`
    ///
    /// Same convergence semantics as [`Database::upsert_posts`]: on
    /// conflict the content, counter, and timestamp fields are refreshed.
    /// An empty list is a no-op.
    pub async fn upsert_comments(&self, comments: &[Comment]) -> Result<()> {
        if comments.is_empty() {
            return Ok(());
        }

        let now = chrono::Utc::now().timestamp();

        for comment in comments {
            sqlx::query(
                r#"
                INSERT INTO comments (
                    post_id, comment_id, author_id, text, likes,
                    posted_at, collected_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(post_id, comment_id) DO UPDATE SET
                    author_id = excluded.author_id,
                    text = excluded.text,
                    likes = excluded.likes,
                    posted_at = excluded.posted_at,
                    collected_at = excluded.collected_at
                "#,
            )
            .bind(comment.post_id)
            .bind(comment.id)
            .bind(comment.author_id)
            .bind(&comment.text)
            .bind(comment.likes)
            .bind(comment.posted_at.timestamp())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to upsert comment {} for post {}: {}",
                    comment.id, comment.post_id, e
                )))
            })?;
        }

        Ok(())
    }

    /// Get all comments collected for a post, in external-id order
    pub async fn get_comments_for_post(&self, post_id: i64) -> Result<Vec<CommentRow>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT
                id, post_id, comment_id, author_id, text, likes,
                posted_at, collected_at
            FROM comments
            WHERE post_id = ?
            ORDER BY comment_id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get comments for post: {}",
                e
            )))
        })?;

        Ok(rows)
    }
}
