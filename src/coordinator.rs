//! Ingestion coordinator
//!
//! Composes one backup run: resolve the media set, size it, start the progress
//! monitor, download, stop the monitor and report a [`RunSummary`]. Each run gets
//! its own [`AggregateStats`]; the record store and the download slots are shared by
//! every run on the same coordinator.

use crate::config::Config;
use crate::db::{Database, DownloadRecord, RecordStatistics};
use crate::engine::{DownloadEngine, MediaFetcher};
use crate::monitor::{ProgressMonitor, StatusSink, dispatch_status, format_duration};
use crate::resolver::{MediaSetResolver, MessageLookup};
use crate::stats::{AggregateStats, StatsSnapshot};
use crate::types::{MediaSet, ResolveRequest};
use crate::utils::{self, DiskUsage, bytes_to_mb};
use crate::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of one ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Local file names of every completed item, in media-set order
    pub files: Vec<String>,
    /// Final counters
    pub stats: StatsSnapshot,
    /// Destination filesystem usage after the run, when it could be read
    pub disk: Option<DiskUsage>,
    /// Where the files were written
    pub destination: PathBuf,
}

impl RunSummary {
    /// Average throughput over the run, in MB/s (elapsed time floored at one second)
    pub fn average_speed_mb(&self) -> f64 {
        let secs = self.stats.elapsed.as_secs_f64().max(1.0);
        bytes_to_mb(self.stats.downloaded_size_bytes) / secs
    }

    /// Summary lines without the headline
    pub fn details(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write_details(&mut out);
        out
    }

    fn write_details(&self, f: &mut impl std::fmt::Write) -> std::fmt::Result {
        writeln!(f, "Downloaded: {} files", self.stats.completed_files)?;
        if self.stats.failed_files > 0 {
            writeln!(f, "Failed: {} files", self.stats.failed_files)?;
        }
        if self.stats.total_size_bytes > 0 {
            writeln!(
                f,
                "Size: {:.1}MB / {:.1}MB ({:.1}%)",
                bytes_to_mb(self.stats.downloaded_size_bytes),
                bytes_to_mb(self.stats.total_size_bytes),
                self.stats.percent()
            )?;
        } else {
            writeln!(f, "Size: {:.1}MB", bytes_to_mb(self.stats.downloaded_size_bytes))?;
        }
        writeln!(f, "Average speed: {:.1}MB/s", self.average_speed_mb())?;
        writeln!(f, "Elapsed: {}", format_duration(self.stats.elapsed.as_secs()))?;
        if let Some(disk) = &self.disk {
            writeln!(f, "Free space: {:.1}GB", disk.free_gb())?;
        }
        write!(f, "Location: {}", self.destination.display())
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "✅ Backup complete!")?;
        self.write_details(f)
    }
}

/// Entry point for backing up forwarded messages
pub struct IngestionCoordinator {
    config: Config,
    db: Arc<Database>,
    resolver: MediaSetResolver,
    engine: DownloadEngine,
}

impl IngestionCoordinator {
    /// Validate `config`, open the record store at its database path and wire up
    /// the pipeline
    pub async fn open(
        config: Config,
        lookup: Arc<dyn MessageLookup>,
        fetcher: Arc<dyn MediaFetcher>,
    ) -> Result<Self> {
        config.validate()?;
        let db = Arc::new(Database::new(&config.download.database_path).await?);
        Self::new(config, db, lookup, fetcher)
    }

    /// Wire up the pipeline over an already opened record store
    pub fn new(
        config: Config,
        db: Arc<Database>,
        lookup: Arc<dyn MessageLookup>,
        fetcher: Arc<dyn MediaFetcher>,
    ) -> Result<Self> {
        config.validate()?;
        let resolver = MediaSetResolver::new(lookup, config.resolver.clone());
        let engine = DownloadEngine::new(Arc::clone(&db), fetcher, &config)?;
        Ok(Self {
            config,
            db,
            resolver,
            engine,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared record store
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Resolve the media set for a forwarded message without downloading it
    pub async fn resolve(&self, request: &ResolveRequest) -> Result<MediaSet> {
        self.resolver.resolve(request).await
    }

    /// Back up everything a forwarded message belongs to into `destination`
    pub async fn ingest(
        &self,
        request: &ResolveRequest,
        destination: &Path,
        sink: Arc<dyn StatusSink>,
    ) -> Result<RunSummary> {
        let set = self.resolver.resolve(request).await?;
        self.ingest_set(set, destination, sink).await
    }

    /// Download an already resolved media set into `destination`
    ///
    /// # Errors
    ///
    /// - [`Error::DestinationUnavailable`] if the directory cannot be created
    /// - [`Error::Database`] if the record store fails; items that finished before
    ///   the failure stay on disk
    pub async fn ingest_set(
        &self,
        set: MediaSet,
        destination: &Path,
        sink: Arc<dyn StatusSink>,
    ) -> Result<RunSummary> {
        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|e| Error::DestinationUnavailable {
                path: destination.to_path_buf(),
                reason: e.to_string(),
            })?;

        let stats = Arc::new(AggregateStats::new());

        if set.is_empty() {
            tracing::info!(destination = %destination.display(), "No media to download");
            dispatch_status(sink.as_ref(), "ℹ️ No media found in this message or its replies").await;
            return Ok(self.summarize(Vec::new(), &stats, destination));
        }

        let preflight = self.engine.preflight(&set).await?;
        let counts = set.kind_counts();
        tracing::info!(
            total_files = preflight.total_files(),
            pending_files = preflight.pending_files(),
            total_size_bytes = preflight.total_size_bytes,
            photos = counts.photos,
            videos = counts.videos,
            documents = counts.documents,
            destination = %destination.display(),
            "Starting ingestion run"
        );
        let notice = format!(
            "🚀 Downloading {} media files ({} photos, {} videos, {} documents), total size: {:.1}MB...",
            preflight.total_files(),
            counts.photos,
            counts.videos,
            counts.documents,
            bytes_to_mb(preflight.total_size_bytes)
        );
        dispatch_status(sink.as_ref(), &notice).await;

        let mut monitor = ProgressMonitor::new(self.config.monitor.clone())?;
        monitor.start(destination.to_path_buf(), Arc::clone(&stats), Arc::clone(&sink));

        let result = self
            .engine
            .run_preflight(preflight, destination, &stats)
            .await;

        monitor.stop().await;

        let files = match result {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(error = %e, "Ingestion run aborted by record store failure");
                let summary = self.summarize(Vec::new(), &stats, destination);
                let text = format!(
                    "❌ Backup stopped: could not record downloads ({e})\n{}",
                    summary.details()
                );
                dispatch_status(sink.as_ref(), &text).await;
                return Err(e);
            }
        };

        let summary = self.summarize(files, &stats, destination);
        tracing::info!(
            completed = summary.stats.completed_files,
            failed = summary.stats.failed_files,
            downloaded_mb = bytes_to_mb(summary.stats.downloaded_size_bytes),
            speed_mb_s = summary.average_speed_mb(),
            "Ingestion run complete"
        );
        dispatch_status(sink.as_ref(), &summary.to_string()).await;
        Ok(summary)
    }

    /// Aggregate view over the record store
    pub async fn statistics(&self) -> Result<RecordStatistics> {
        self.db.aggregate_statistics().await
    }

    /// Drop records whose files are gone; returns `(removed, scanned)`
    pub async fn purge_orphans(&self) -> Result<(u64, u64)> {
        self.db.purge_orphans().await
    }

    /// Most recently recorded downloads, newest first
    pub async fn recent_records(&self, limit: u32) -> Result<Vec<DownloadRecord>> {
        self.db.recent_records(limit).await
    }

    fn summarize(&self, files: Vec<String>, stats: &AggregateStats, destination: &Path) -> RunSummary {
        let disk = match utils::disk_usage(destination) {
            Ok(usage) => Some(usage),
            Err(e) => {
                tracing::warn!(path = %destination.display(), error = %e, "Failed to read disk usage");
                None
            }
        };
        RunSummary {
            files,
            stats: stats.snapshot(),
            disk,
            destination: destination.to_path_buf(),
        }
    }
}
