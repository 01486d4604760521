//! Download record lookups, upserts, statistics and housekeeping.

use crate::error::DatabaseError;
use crate::types::{MediaKind, StableId};
use crate::{Error, Result};
use std::collections::HashMap;

use super::{Database, DownloadRecord, NewDownloadRecord, RecordStatistics};

const RECORD_COLUMNS: &str = r#"
    stable_id, platform_file_ref, message_id, chat_id, file_name,
    original_name, local_path, size_bytes, kind, mime_type,
    recorded_at, source_timestamp
"#;

impl Database {
    /// Check whether a record exists for a stable id
    pub async fn is_known(&self, stable_id: &StableId) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM download_records WHERE stable_id = ? LIMIT 1")
                .bind(stable_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to check record: {}",
                        e
                    )))
                })?;

        Ok(found.is_some())
    }

    /// Get the record for a stable id
    pub async fn lookup(&self, stable_id: &StableId) -> Result<Option<DownloadRecord>> {
        let row = sqlx::query_as::<_, DownloadRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM download_records WHERE stable_id = ? LIMIT 1"
        ))
        .bind(stable_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get record: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Insert a record or replace the one with the same stable id
    ///
    /// Duplicates are an intentional overwrite: a stale record (file gone from disk)
    /// is refreshed by the download that replaced the file.
    pub async fn upsert(&self, record: &NewDownloadRecord) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let _guard = self.write_lock.lock().await;

        sqlx::query(
            r#"
            INSERT INTO download_records (
                stable_id, platform_file_ref, message_id, chat_id, file_name,
                original_name, local_path, size_bytes, kind, mime_type,
                recorded_at, source_timestamp
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(stable_id) DO UPDATE SET
                platform_file_ref = excluded.platform_file_ref,
                message_id = excluded.message_id,
                chat_id = excluded.chat_id,
                file_name = excluded.file_name,
                original_name = excluded.original_name,
                local_path = excluded.local_path,
                size_bytes = excluded.size_bytes,
                kind = excluded.kind,
                mime_type = excluded.mime_type,
                recorded_at = excluded.recorded_at,
                source_timestamp = excluded.source_timestamp
            "#,
        )
        .bind(&record.stable_id)
        .bind(&record.platform_file_ref)
        .bind(record.message_id)
        .bind(record.chat_id)
        .bind(&record.file_name)
        .bind(&record.original_name)
        .bind(&record.local_path)
        .bind(record.size_bytes)
        .bind(record.kind)
        .bind(&record.mime_type)
        .bind(now)
        .bind(record.source_timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to upsert record: {}",
                e
            )))
        })?;

        tracing::debug!(stable_id = %record.stable_id, file_name = %record.file_name, "Recorded download");
        Ok(())
    }

    /// Aggregate counts over every stored record
    pub async fn aggregate_statistics(&self) -> Result<RecordStatistics> {
        let (total_files, total_size_bytes, unique_chats): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(size_bytes), 0),
                COUNT(DISTINCT chat_id)
            FROM download_records
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to aggregate records: {}",
                e
            )))
        })?;

        let by_kind: Vec<(MediaKind, i64)> =
            sqlx::query_as("SELECT kind, COUNT(*) FROM download_records GROUP BY kind")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to count records by kind: {}",
                        e
                    )))
                })?;

        let mut counts_by_kind = HashMap::new();
        for (kind, count) in by_kind {
            *counts_by_kind.entry(kind).or_insert(0) += count as u64;
        }

        Ok(RecordStatistics {
            total_files: total_files as u64,
            total_size_bytes: total_size_bytes.max(0) as u64,
            unique_chats: unique_chats as u64,
            counts_by_kind,
        })
    }

    /// Delete records whose file no longer exists on disk
    ///
    /// Returns `(removed, scanned)`. Deletions run in one transaction, so a failure
    /// part-way leaves the store as it was.
    pub async fn purge_orphans(&self) -> Result<(u64, u64)> {
        let _guard = self.write_lock.lock().await;

        let rows: Vec<(StableId, String)> =
            sqlx::query_as("SELECT stable_id, local_path FROM download_records")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to list records: {}",
                        e
                    )))
                })?;

        let scanned = rows.len() as u64;
        let mut orphans = Vec::new();
        for (stable_id, local_path) in rows {
            // An unreadable path counts as present; only a definite "not found" purges
            if !tokio::fs::try_exists(&local_path).await.unwrap_or(true) {
                tracing::debug!(stable_id = %stable_id, local_path = %local_path, "Record points to missing file");
                orphans.push(stable_id);
            }
        }

        if orphans.is_empty() {
            tracing::info!(scanned, "Orphan purge complete, nothing removed");
            return Ok((0, scanned));
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        for stable_id in &orphans {
            sqlx::query("DELETE FROM download_records WHERE stable_id = ?")
                .bind(stable_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to delete orphaned record: {}",
                        e
                    )))
                })?;
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit orphan purge: {}",
                e
            )))
        })?;

        let removed = orphans.len() as u64;
        tracing::info!(removed, scanned, "Orphan purge complete");
        Ok((removed, scanned))
    }

    /// Most recently written records, newest first
    pub async fn recent_records(&self, limit: u32) -> Result<Vec<DownloadRecord>> {
        let rows = sqlx::query_as::<_, DownloadRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM download_records ORDER BY recorded_at DESC, id DESC LIMIT ?"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list recent records: {}",
                e
            )))
        })?;

        Ok(rows)
    }
}
