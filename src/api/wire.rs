//! Raw VK wire shapes and their normalization into domain types.
//!
//! Every response arrives in an envelope: `{"response": ...}` on success or
//! `{"error": {"error_code": n, "error_msg": "..."}}` on failure. Reaction
//! counters arrive as `{"count": n}` objects and timestamps as integer epoch
//! seconds; both are flattened/normalized here so nothing past this module
//! sees wire shapes.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{ApiError, Error, Result};
use crate::types::{Comment, Post};

/// Top-level VK response envelope
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub(crate) response: Option<T>,
    pub(crate) error: Option<WireError>,
}

impl<T> Envelope<T> {
    /// Unwrap the envelope into the payload or a typed error
    pub(crate) fn into_result(self) -> Result<T> {
        if let Some(err) = self.error {
            return Err(Error::Api(ApiError::from_platform(
                err.error_code,
                err.error_msg,
            )));
        }
        self.response.ok_or_else(|| {
            Error::Api(ApiError::Malformed(
                "envelope carried neither response nor error".to_string(),
            ))
        })
    }
}

/// Platform-level error payload
#[derive(Debug, Deserialize)]
pub(crate) struct WireError {
    pub(crate) error_code: i64,
    #[serde(default)]
    pub(crate) error_msg: String,
}

/// Paginated listing payload (`wall.get`, `wall.getComments`)
#[derive(Debug, Deserialize)]
pub(crate) struct ItemsPage<T> {
    #[serde(default)]
    pub(crate) items: Vec<T>,
}

/// Reaction counter in its wire shape
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CountField {
    #[serde(default)]
    pub(crate) count: i64,
}

/// One wall post as it appears on the wire
#[derive(Debug, Default, Deserialize)]
pub(crate) struct WirePost {
    pub(crate) id: i64,
    pub(crate) date: i64,
    #[serde(default)]
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) likes: CountField,
    #[serde(default)]
    pub(crate) reposts: CountField,
}

impl WirePost {
    /// Normalize into the domain type, stamping the canonical positive
    /// community id
    pub(crate) fn into_post(self, group_id: i64) -> Post {
        Post {
            id: self.id,
            group_id,
            text: self.text,
            likes: self.likes.count,
            reposts: self.reposts.count,
            posted_at: epoch_to_datetime(self.date),
        }
    }
}

/// One comment as it appears on the wire
#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireComment {
    pub(crate) id: i64,
    #[serde(default)]
    pub(crate) from_id: i64,
    pub(crate) date: i64,
    #[serde(default)]
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) likes: CountField,
}

impl WireComment {
    /// Normalize into the domain type, attaching the owning post id
    pub(crate) fn into_comment(self, post_id: i64) -> Comment {
        Comment {
            id: self.id,
            post_id,
            author_id: self.from_id,
            text: self.text,
            likes: self.likes.count,
            posted_at: epoch_to_datetime(self.date),
        }
    }
}

/// Epoch seconds to UTC datetime; out-of-range values collapse to the epoch
fn epoch_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
}
