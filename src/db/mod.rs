//! Record store for chat-media-backup
//!
//! Handles SQLite persistence of what was already downloaded and where, keyed by
//! the platform's stable media id.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`records`] - Download record lookups, upserts, statistics and housekeeping

use crate::types::{MediaKind, StableId};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::collections::HashMap;

mod migrations;
mod records;

/// Download record to be written to the store
#[derive(Debug, Clone)]
pub struct NewDownloadRecord {
    /// Platform-issued content id (unique key)
    pub stable_id: StableId,
    /// Platform handle for fetching the bytes again
    pub platform_file_ref: String,
    /// Message the media was attached to
    pub message_id: i64,
    /// Chat the message lives in
    pub chat_id: i64,
    /// File name written to disk
    pub file_name: String,
    /// Original name supplied by the sender, if any
    pub original_name: Option<String>,
    /// Absolute or caller-relative path of the stored file
    pub local_path: String,
    /// Size of the stored file in bytes
    pub size_bytes: Option<i64>,
    /// Media kind
    pub kind: MediaKind,
    /// Declared MIME type
    pub mime_type: Option<String>,
    /// Unix timestamp of the source message
    pub source_timestamp: Option<i64>,
}

/// Download record from database
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// Platform-issued content id (unique key)
    pub stable_id: StableId,
    /// Platform handle for fetching the bytes again
    pub platform_file_ref: String,
    /// Message the media was attached to
    pub message_id: i64,
    /// Chat the message lives in
    pub chat_id: i64,
    /// File name written to disk
    pub file_name: String,
    /// Original name supplied by the sender, if any
    pub original_name: Option<String>,
    /// Path of the stored file
    pub local_path: String,
    /// Size of the stored file in bytes
    pub size_bytes: Option<i64>,
    /// Media kind
    pub kind: MediaKind,
    /// Declared MIME type
    pub mime_type: Option<String>,
    /// Unix timestamp when the record was (last) written
    pub recorded_at: i64,
    /// Unix timestamp of the source message
    pub source_timestamp: Option<i64>,
}

/// Aggregate view over every stored record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStatistics {
    /// Number of records
    pub total_files: u64,
    /// Sum of recorded file sizes
    pub total_size_bytes: u64,
    /// Number of distinct source chats
    pub unique_chats: u64,
    /// Record count per media kind
    pub counts_by_kind: HashMap<MediaKind, u64>,
}

impl RecordStatistics {
    /// Total size in megabytes, rounded to two decimals
    pub fn total_size_mb(&self) -> f64 {
        (self.total_size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
    }
}

/// Database handle for the record store
///
/// Reads go straight to the pool. Writes funnel through `write_lock` so concurrent
/// download tasks never race on the same stable id, whatever SQLite's own locking does.
pub struct Database {
    pool: SqlitePool,
    write_lock: tokio::sync::Mutex<()>,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
