//! Configuration types for vk-harvest

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// VK API access configuration (endpoint, timeouts, retry, page sizes)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the VK API (default: "https://api.vk.com/method")
    ///
    /// Overridable for tests and for regional mirrors.
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// API version sent with every call (default: "5.131")
    #[serde(default = "default_api_version")]
    pub version: String,

    /// TCP connect timeout (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Overall per-request timeout, connect + read (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Page size for the paginated comment listing (default: 100, the API maximum)
    #[serde(default = "default_comments_page_size")]
    pub comments_page_size: u32,

    /// Retry policy for transient network failures inside the client
    ///
    /// Applies to network flakiness only. Explicit rate-limit responses from
    /// the API are never retried here; they propagate to the worker layer.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            version: default_api_version(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            comments_page_size: default_comments_page_size(),
            retry: RetryConfig::default(),
        }
    }
}

/// Collection pipeline configuration (per-source caps, phase weights)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Maximum wall posts fetched and stored per source (default: 10)
    ///
    /// Caps the detail-fetch fan-out per source. Only the first page of the
    /// post listing is ever requested; this is the page size.
    #[serde(default = "default_posts_per_source")]
    pub posts_per_source: u32,

    /// Weight of the source-validation phase in overall progress (default: 0.10)
    #[serde(default = "default_groups_weight")]
    pub groups_weight: f64,

    /// Weight of the post-listing phase in overall progress (default: 0.30)
    #[serde(default = "default_posts_weight")]
    pub posts_weight: f64,

    /// Weight of the comment-listing phase in overall progress (default: 0.60)
    #[serde(default = "default_comments_weight")]
    pub comments_weight: f64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            posts_per_source: default_posts_per_source(),
            groups_weight: default_groups_weight(),
            posts_weight: default_posts_weight(),
            comments_weight: default_comments_weight(),
        }
    }
}

/// Worker configuration (concurrency, rate limiting, job retry)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum collection tasks running concurrently (default: 1)
    ///
    /// Deliberately conservative: the bottleneck is the API's rate limit,
    /// not local compute.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Shared API call budget in calls per minute (None = unlimited)
    #[serde(default = "default_calls_per_minute")]
    pub calls_per_minute: Option<u32>,

    /// Job-level retry policy for transient run failures
    #[serde(default)]
    pub backoff: BackoffPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            calls_per_minute: default_calls_per_minute(),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Path to the SQLite database file (default: "./vk-harvest.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Main configuration for the vk-harvest worker
///
/// Fields are organized into logical sub-configs:
/// - [`api`](ApiConfig) — endpoint, timeouts, client retry, page sizes
/// - [`collection`](CollectionConfig) — per-source caps and phase weights
/// - [`worker`](WorkerConfig) — concurrency, rate limit, job retry
/// - [`persistence`](PersistenceConfig) — database location
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// VK API access settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Collection pipeline settings
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Worker settings
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Data storage settings
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Job-level backoff policy owned by the worker
///
/// Distinct from [`RetryConfig`]: that one governs the API client's narrow
/// in-call retry for network flakiness; this one governs re-delivery of a
/// whole failed collection job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Base delay before the first re-delivery (default: 30 seconds)
    #[serde(default = "default_backoff_base_delay", with = "duration_serde")]
    pub base_delay: Duration,

    /// Multiplier applied per failed attempt (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub multiplier: f64,

    /// Cap on the re-delivery delay (default: 10 minutes)
    #[serde(default = "default_backoff_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Maximum job attempts including the first (default: 3)
    #[serde(default = "default_job_max_attempts")]
    pub max_attempts: u32,

    /// Add random jitter to re-delivery delays to avoid thundering-herd
    /// re-delivery (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_delay: Duration::from_secs(600),
            max_attempts: 3,
            jitter: true,
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.vk.com/method".to_string()
}

fn default_api_version() -> String {
    "5.131".to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_comments_page_size() -> u32 {
    100
}

fn default_posts_per_source() -> u32 {
    10
}

fn default_groups_weight() -> f64 {
    0.10
}

fn default_posts_weight() -> f64 {
    0.30
}

fn default_comments_weight() -> f64 {
    0.60
}

fn default_max_concurrent_tasks() -> usize {
    1
}

fn default_calls_per_minute() -> Option<u32> {
    Some(180)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./vk-harvest.db")
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_backoff_base_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_max_delay() -> Duration {
    Duration::from_secs(600)
}

fn default_job_max_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (serializes as whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_complete() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "https://api.vk.com/method");
        assert_eq!(config.api.version, "5.131");
        assert_eq!(config.collection.posts_per_source, 10);
        assert_eq!(config.worker.max_concurrent_tasks, 1);
        assert_eq!(config.worker.calls_per_minute, Some(180));
    }

    #[test]
    fn default_phase_weights_sum_to_one() {
        let config = CollectionConfig::default();
        let sum = config.groups_weight + config.posts_weight + config.comments_weight;
        assert!((sum - 1.0).abs() < f64::EPSILON, "weights must sum to 1.0, got {sum}");
    }

    #[test]
    fn empty_json_deserializes_with_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.collection.posts_per_source, 10);
        assert_eq!(config.api.comments_page_size, 100);
        assert_eq!(config.worker.backoff.max_attempts, 3);
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let retry = RetryConfig::default();
        let json = serde_json::to_value(&retry).unwrap();
        assert_eq!(json["initial_delay"], 1);
        assert_eq!(json["max_delay"], 60);

        let parsed: RetryConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.initial_delay, Duration::from_secs(1));
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let json = r#"{"collection": {"posts_per_source": 25}, "worker": {"calls_per_minute": null}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.collection.posts_per_source, 25);
        assert_eq!(config.worker.calls_per_minute, None);
        assert_eq!(config.worker.max_concurrent_tasks, 1);
    }
}
