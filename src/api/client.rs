//! Reqwest-backed implementation of [`ContentApi`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use url::Url;

use super::ContentApi;
use super::wire::{Envelope, ItemsPage, WireComment, WirePost};
use crate::config::ApiConfig;
use crate::error::{ApiError, Error, Result};
use crate::retry::with_backoff;
use crate::types::{Comment, Post};

/// Typed client over the VK wall API
///
/// The bearer token is injected once at construction, never per call.
/// Timeouts, retry behavior and page sizes come from [`ApiConfig`].
#[derive(Debug)]
pub struct VkApiClient {
    client: reqwest::Client,
    token: String,
    config: ApiConfig,
}

impl VkApiClient {
    /// Create a new client with the given service token and configuration
    ///
    /// Fails if the configured base URL does not parse or the underlying
    /// HTTP client cannot be constructed.
    pub fn new(token: String, config: ApiConfig) -> Result<Self> {
        // Validate the base URL up front so a bad config fails at startup,
        // not on the first collection run
        Self::parse_base(&config.base_url)?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            token,
            config,
        })
    }

    fn parse_base(base_url: &str) -> Result<Url> {
        // A trailing slash keeps Url::join from replacing the last path segment
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        Url::parse(&base).map_err(|e| Error::Config {
            message: format!("invalid API base URL '{base_url}': {e}"),
            key: Some("api.base_url".to_string()),
        })
    }

    fn endpoint(&self, api_method: &str) -> Result<Url> {
        let base = Self::parse_base(&self.config.base_url)?;
        base.join(api_method).map_err(|e| Error::Config {
            message: format!("invalid API method '{api_method}': {e}"),
            key: Some("api.base_url".to_string()),
        })
    }

    /// Perform one API call with envelope handling and bounded retry for
    /// network flakiness
    ///
    /// Rate-limit and platform errors come back typed and are never retried
    /// here.
    async fn call_page<T: DeserializeOwned>(
        &self,
        api_method: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = self.endpoint(api_method)?;

        with_backoff(&self.config.retry, || {
            let url = url.clone();
            async move {
                let resp = self
                    .client
                    .get(url)
                    .bearer_auth(&self.token)
                    .query(&[("v", self.config.version.as_str())])
                    .query(params)
                    .send()
                    .await?;

                let status = resp.status();
                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(Error::Api(ApiError::Http {
                        status: status.as_u16(),
                        message: body,
                    }));
                }

                let envelope: Envelope<T> = resp.json().await?;
                envelope.into_result()
            }
        })
        .await
    }
}

#[async_trait]
impl ContentApi for VkApiClient {
    async fn fetch_posts(&self, group_id: i64) -> Result<Vec<Post>> {
        // Group walls are addressed with a negative owner id on the wire
        let params = [("owner_id", (-group_id).to_string())];

        let page: ItemsPage<WirePost> = self.call_page("wall.get", &params).await?;
        let posts: Vec<Post> = page
            .items
            .into_iter()
            .map(|p| p.into_post(group_id))
            .collect();

        tracing::debug!(group_id, count = posts.len(), "Fetched wall posts");
        Ok(posts)
    }

    async fn fetch_comments(&self, group_id: i64, post_id: i64) -> Result<Vec<Comment>> {
        let page_size = self.config.comments_page_size.max(1);
        let mut comments: Vec<Comment> = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let params = [
                ("owner_id", (-group_id).to_string()),
                ("post_id", post_id.to_string()),
                ("count", page_size.to_string()),
                ("offset", offset.to_string()),
            ];

            let page: ItemsPage<WireComment> =
                self.call_page("wall.getComments", &params).await?;
            let fetched = page.items.len();

            comments.extend(page.items.into_iter().map(|c| c.into_comment(post_id)));

            // A short page means the listing is exhausted
            if fetched < page_size as usize {
                break;
            }
            offset += fetched as u64;
        }

        tracing::debug!(
            group_id,
            post_id,
            count = comments.len(),
            "Fetched comments"
        );
        Ok(comments)
    }
}
