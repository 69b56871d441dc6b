//! Core types for vk-harvest

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a collection task
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<TaskId> for i64 {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl PartialEq<i64> for TaskId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl PartialEq<TaskId> for i64 {
    fn eq(&self, other: &TaskId) -> bool {
        *self == other.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for TaskId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for TaskId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for TaskId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Task status
///
/// Transitions are monotonic: `Pending -> Processing -> Completed | Failed`.
/// Both terminal states are absorbing; a task never regresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created, waiting for a worker to pick it up
    Pending,
    /// A worker is collecting content for this task
    Processing,
    /// All sources processed without errors
    Completed,
    /// Finished with a non-empty error list or a fatal error
    Failed,
}

impl TaskStatus {
    /// Convert integer status code to TaskStatus enum
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => TaskStatus::Pending,
            1 => TaskStatus::Processing,
            2 => TaskStatus::Completed,
            3 => TaskStatus::Failed,
            _ => TaskStatus::Failed, // Default to Failed for unknown status
        }
    }

    /// Convert TaskStatus enum to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Processing => 1,
            TaskStatus::Completed => 2,
            TaskStatus::Failed => 3,
        }
    }

    /// True for the two absorbing states
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Collection phase of a task
///
/// Phases are sequential per source and drive the weighted progress model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Source validation and normalization
    Groups,
    /// Wall post listing
    Posts,
    /// Comment listing per post
    Comments,
}

/// Aggregated counters for one task, persisted with the task row
///
/// Counters only ever increase and the error list only ever grows; they are
/// never reset mid-run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetrics {
    /// Wall posts stored so far
    pub posts_collected: i64,
    /// Comments stored so far
    pub comments_collected: i64,
    /// Human-readable per-source and per-post error messages
    pub errors: Vec<String>,
}

/// One wall post, normalized from the VK wire shape
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// External post id (unique within the owning community)
    pub id: i64,
    /// Owning community id, canonical positive form
    pub group_id: i64,
    /// Post body text
    pub text: String,
    /// Like count, flattened from the `{"count": n}` wire shape
    pub likes: i64,
    /// Repost count, flattened from the `{"count": n}` wire shape
    pub reposts: i64,
    /// Publication time, normalized from epoch seconds
    pub posted_at: DateTime<Utc>,
}

/// One comment under a wall post, normalized from the VK wire shape
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// External comment id
    pub id: i64,
    /// External id of the post this comment belongs to
    pub post_id: i64,
    /// Author id (`from_id` on the wire)
    pub author_id: i64,
    /// Comment body text
    pub text: String,
    /// Like count, flattened from the `{"count": n}` wire shape
    pub likes: i64,
    /// Publication time, normalized from epoch seconds
    pub posted_at: DateTime<Utc>,
}

/// Job payload consumed by the worker
///
/// Deliberately minimal: everything else (the sources list, metrics) is read
/// from the task record so the payload can never diverge from task state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionJob {
    /// The task to collect
    pub task_id: TaskId,
}

/// Snapshot of one task's externally visible state
///
/// Returned by [`crate::Worker::task_status`] for the embedding application's
/// status endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskStatusInfo {
    /// Current lifecycle status
    pub status: TaskStatus,
    /// Phase-weighted progress snapshot
    pub progress: crate::progress::ProgressSnapshot,
    /// Accumulated error messages
    pub errors: Vec<String>,
    /// Source identifiers as submitted
    pub sources: Vec<String>,
}

/// Event emitted during task lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task accepted and queued for collection
    TaskQueued {
        /// Task ID
        id: TaskId,
        /// Number of submitted sources
        sources: usize,
    },

    /// Collection started; the task entered `processing`
    TaskStarted {
        /// Task ID
        id: TaskId,
    },

    /// One source finished (successfully or not); metrics were checkpointed
    SourceProcessed {
        /// Task ID
        id: TaskId,
        /// The source as submitted
        source: String,
        /// Posts stored for this source
        posts: i64,
        /// Comments stored for this source
        comments: i64,
        /// Overall progress percentage after this source
        percentage: u8,
    },

    /// Task reached `completed`
    TaskCompleted {
        /// Task ID
        id: TaskId,
        /// Total posts stored
        posts_collected: i64,
        /// Total comments stored
        comments_collected: i64,
    },

    /// Task reached `failed`
    TaskFailed {
        /// Task ID
        id: TaskId,
        /// Number of accumulated error messages
        error_count: usize,
    },

    /// A failed job will be retried after a backoff delay
    JobRetryScheduled {
        /// Task ID
        id: TaskId,
        /// Attempt number just failed (1-based)
        attempt: u32,
        /// Delay before the next attempt, in milliseconds
        delay_ms: u64,
    },

    /// Worker is shutting down
    Shutdown,
}
