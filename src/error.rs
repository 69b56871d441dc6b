//! Error types for vk-harvest
//!
//! This module provides comprehensive error handling for the library, including:
//! - Domain-specific error types (Api, Task, Database)
//! - Transient-vs-fatal classification for job-level retry decisions
//! - Context information (task id, source id, operation, etc.)

use thiserror::Error;

/// Result type alias for vk-harvest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vk-harvest
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "worker.max_concurrent_tasks")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// VK API returned a platform-level error or an unusable payload
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Task lifecycle error
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., duplicate key)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Errors reported by the VK API or raised while decoding its responses
#[derive(Debug, Error)]
pub enum ApiError {
    /// The platform signalled that we are calling too fast (error code 6/9/29).
    ///
    /// Never retried inside the client; it must propagate so the shared
    /// rate limiter can slow the whole worker down instead.
    #[error("rate limited by API: {message}")]
    RateLimited {
        /// Error message returned by the platform
        message: String,
    },

    /// Any other platform-level error envelope (`{"error": {...}}`)
    #[error("API error {code}: {message}")]
    Platform {
        /// Numeric VK error code
        code: i64,
        /// Error message returned by the platform
        message: String,
    },

    /// Non-success HTTP status outside the VK error envelope
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body (or a summary of it)
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("malformed API response: {0}")]
    Malformed(String),
}

/// VK error codes that signal "slow down" rather than a real failure
const RATE_LIMIT_CODES: &[i64] = &[6, 9, 29];

impl ApiError {
    /// Build an `ApiError` from a VK error envelope, mapping the
    /// rate-limit family of codes onto [`ApiError::RateLimited`].
    pub fn from_platform(code: i64, message: String) -> Self {
        if RATE_LIMIT_CODES.contains(&code) {
            ApiError::RateLimited { message }
        } else {
            ApiError::Platform { code, message }
        }
    }
}

/// Task lifecycle errors
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task not found in the database
    #[error("task {id} not found")]
    NotFound {
        /// The task ID that was not found
        id: i64,
    },

    /// Task already in requested state
    #[error("task {id} is already {state}")]
    AlreadyInState {
        /// The task ID that is already in the requested state
        id: i64,
        /// The current state (e.g., "completed")
        state: String,
    },

    /// Cannot perform operation in current state
    #[error("cannot {operation} task {id} in state {current_state}")]
    InvalidState {
        /// The task ID that is in an invalid state for the operation
        id: i64,
        /// The operation that was attempted (e.g., "enqueue", "start")
        operation: String,
        /// The current state that prevents the operation
        current_state: String,
    },

    /// Source identifier could not be parsed into a community id
    #[error("invalid source id: {0}")]
    InvalidSource(String),
}

impl Error {
    /// Classify this error for job-level retry decisions.
    ///
    /// Transient errors (network flakiness, storage unavailability, API
    /// rate limiting) are worth re-running the whole job for, with the
    /// worker's backoff policy. Everything else is permanent: the task row
    /// has already been marked failed and re-running would fail the same way.
    ///
    /// This is deliberately broader than [`crate::retry::IsRetryable`],
    /// which governs the API client's narrow in-call retry for pure
    /// network flakiness.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network(_) => true,
            // Storage-layer trouble is assumed recoverable (restart, failover)
            Error::Sqlx(_) => true,
            Error::Database(e) => matches!(
                e,
                DatabaseError::ConnectionFailed(_) | DatabaseError::QueryFailed(_)
            ),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Api(ApiError::RateLimited { .. }) => true,
            // Platform errors, malformed payloads: re-running won't help
            Error::Api(_) => false,
            // Task state errors are permanent by definition
            Error::Task(_) => false,
            Error::Config { .. } => false,
            Error::NotFound(_) => false,
            Error::ShuttingDown => false,
            Error::Serialization(_) => false,
            Error::Other(_) => false,
        }
    }
}
