//! Error types for chat-media-backup
//!
//! This module provides the error taxonomy for the ingestion pipeline:
//! - [`Error`] - run-level and storage errors surfaced to the caller
//! - [`DatabaseError`] - record store failures
//! - [`FetchError`] - per-item media fetch failures, classified for retry
//! - [`SinkError`] - status sink failures (never fatal)

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for chat-media-backup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for chat-media-backup
///
/// Per-item download failures never reach this type through the public API; they are
/// counted in the run statistics instead. What does surface here are the failures that
/// end a whole run (destination not creatable, trigger message unreachable) and record
/// store errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_downloads")
        key: Option<String>,
    },

    /// Record store operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// The message (or chat) could not be looked up
    #[error("message lookup failed: {0}")]
    Lookup(String),

    /// Destination directory cannot be created or used
    #[error("destination {path} unavailable: {reason}")]
    DestinationUnavailable {
        /// The destination directory requested by the caller
        path: PathBuf,
        /// Why it cannot be used
        reason: String,
    },
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
}

/// Classified failure of a single media fetch
///
/// The media fetch collaborator decides the class; the engine only reacts to it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection reset, I/O error, timeout or a generic remote-procedure error
    #[error("transient failure: {0}")]
    Transient(String),

    /// The platform asked us to wait before trying again
    #[error("rate limited: wait {}s", .wait.as_secs())]
    RateLimited {
        /// How long the platform asked us to wait
        wait: Duration,
    },

    /// Anything else; never retried
    #[error("fatal failure: {0}")]
    Fatal(String),
}

impl FetchError {
    /// Rate-limit signal expressed in whole seconds, the way chat platforms report it
    pub fn rate_limited_secs(seconds: u64) -> Self {
        FetchError::RateLimited {
            wait: Duration::from_secs(seconds),
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        // Local I/O trouble while writing the stream is treated like a dropped connection
        FetchError::Transient(e.to_string())
    }
}

/// Status sink failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The sink already shows this exact text
    #[error("content not modified")]
    NotModified,

    /// Any other delivery failure
    #[error("status update failed: {0}")]
    Failed(String),
}
