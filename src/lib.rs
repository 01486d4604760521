//! # chat-media-backup
//!
//! Media ingestion pipeline for backing up attachments of forwarded chat messages.
//!
//! Given the original message behind a forward, the pipeline reconstructs the whole
//! unit it belongs to (album siblings plus replies with media), downloads every
//! attachment into a caller-chosen directory with bounded concurrency and retries,
//! skips anything already recorded in a local SQLite store, and reports progress
//! through a caller-supplied status sink.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI, bot front-end or GUI; the chat platform is reached
//!   through the [`MessageLookup`] and [`MediaFetcher`] traits
//! - **Sensible defaults** - `Config::default()` is a working setup
//! - **Failure-tolerant** - a failed item never aborts its siblings
//!
//! ## Quick Start
//!
//! ```no_run
//! use chat_media_backup::{Config, IngestionCoordinator, ResolveRequest};
//! # use chat_media_backup::{MessageLookup, MediaFetcher, StatusSink};
//! # use std::sync::Arc;
//! # async fn example(
//! #     lookup: Arc<dyn MessageLookup>,
//! #     fetcher: Arc<dyn MediaFetcher>,
//! #     sink: Arc<dyn StatusSink>,
//! # ) -> chat_media_backup::Result<()> {
//! let coordinator = IngestionCoordinator::open(Config::default(), lookup, fetcher).await?;
//!
//! let summary = coordinator
//!     .ingest(
//!         &ResolveRequest::album(-1001234567890, 4521, 6),
//!         std::path::Path::new("/backups/trip"),
//!         sink,
//!     )
//!     .await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Ingestion coordinator and run summaries
pub mod coordinator;
/// Download record store
pub mod db;
/// Bounded-concurrency download engine
pub mod engine;
/// Error types
pub mod error;
/// Progress monitor and status sinks
pub mod monitor;
/// Media-set resolver
pub mod resolver;
/// Retry logic with attempt-indexed backoff
pub mod retry;
/// Per-run progress counters
pub mod stats;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{IngestionCoordinator, RunSummary};
pub use db::{Database, DownloadRecord, RecordStatistics};
pub use engine::{DownloadEngine, MediaFetcher};
pub use error::{DatabaseError, Error, FetchError, Result, SinkError};
pub use monitor::{ProgressMonitor, StatusSink};
pub use resolver::{MediaSetResolver, MessageFilter, MessageLookup};
pub use stats::{AggregateStats, StatsSnapshot};
pub use types::{MediaItem, MediaKind, MediaSet, MessageRef, ResolveRequest, StableId};
