//! VK API client
//!
//! A typed, rate-limit-aware client over the VK wall API:
//! - [`ContentApi`] - the trait the collection pipeline consumes, and the
//!   seam for test fakes
//! - [`VkApiClient`] - the reqwest-backed implementation
//! - [`wire`] - raw wire shapes and their normalization into domain types
//!
//! The client performs bounded retry with exponential backoff for transient
//! network failures only. Explicit rate-limit signals from the platform
//! (error codes 6/9/29) are never retried here — they propagate so the
//! worker's shared limiter can slow everything down instead.

mod client;
pub(crate) mod wire;

pub use client::VkApiClient;

use crate::error::Result;
use crate::types::{Comment, Post};
use async_trait::async_trait;

/// Read access to a community's wall content
///
/// The production implementation is [`VkApiClient`]; tests substitute
/// scripted fakes.
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Fetch the first page of wall posts for a community.
    ///
    /// Only the first page is ever requested: the per-source workload is
    /// deliberately bounded, and the caller caps the returned list further.
    /// `group_id` is the canonical positive community id; the wire call
    /// addresses the wall as `owner_id = -group_id`.
    async fn fetch_posts(&self, group_id: i64) -> Result<Vec<Post>>;

    /// Fetch ALL comments under one wall post.
    ///
    /// Pages through the comment listing until a page comes back smaller
    /// than the page size, accumulating every page into one result.
    async fn fetch_comments(&self, group_id: i64, post_id: i64) -> Result<Vec<Comment>>;
}
