//! Download engine
//!
//! Fetches every attachment of a [`MediaSet`] into a destination directory with a
//! fixed number of global download slots, per-item retry and rate-limit handling.
//! Items already recorded in the [`Database`] whose file still exists are skipped.
//!
//! ## Submodules
//!
//! - [`naming`] - destination file names and MIME-derived extensions
//!
//! Item-level failures are counted in [`AggregateStats`] and never abort sibling
//! downloads. Record store failures are reported to the caller once every item has
//! resolved.

use crate::config::{Config, DownloadConfig, RetryConfig};
use crate::db::{Database, DownloadRecord, NewDownloadRecord};
use crate::error::FetchError;
use crate::retry::with_retry;
use crate::stats::{AggregateStats, ItemProgress};
use crate::types::{MediaItem, MediaKind, MediaSet, MessageRef, StableId};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub mod naming;

/// Progress callback handed to a [`MediaFetcher`]: cumulative bytes written so far
pub type ProgressCallback = dyn Fn(u64) + Send + Sync;

/// Downloads the bytes of one media item
///
/// Implemented by the chat-platform adapter. Failures must be classified: the engine
/// retries [`FetchError::Transient`], waits out [`FetchError::RateLimited`] and gives
/// up on [`FetchError::Fatal`].
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Write the media to `destination`, reporting cumulative bytes through `on_progress`
    ///
    /// Returns the number of bytes written.
    async fn fetch(
        &self,
        item: &MediaItem,
        destination: &Path,
        on_progress: &ProgressCallback,
    ) -> std::result::Result<u64, FetchError>;
}

/// One member of a media set after the pre-flight check
#[derive(Debug, Clone)]
pub struct PlannedItem {
    /// Source message
    pub message: MessageRef,
    /// Its attachment
    pub media: MediaItem,
    /// Record whose file is still on disk; the item will be skipped
    pub existing: Option<DownloadRecord>,
}

/// Result of the pre-flight check: what to download and how big it is
#[derive(Debug, Clone, Default)]
pub struct Preflight {
    /// Every member of the set, in order
    pub items: Vec<PlannedItem>,
    /// Expected bytes across items that still need downloading
    pub total_size_bytes: u64,
}

impl Preflight {
    /// Number of items in the set
    pub fn total_files(&self) -> usize {
        self.items.len()
    }

    /// Items that will actually be fetched
    pub fn pending_files(&self) -> usize {
        self.items.iter().filter(|i| i.existing.is_none()).count()
    }
}

enum ItemOutcome {
    Skipped(String),
    Downloaded(String),
    Failed,
    StorageFailed(Error),
}

/// Bounded-concurrency downloader shared by every run
pub struct DownloadEngine {
    db: Arc<Database>,
    fetcher: Arc<dyn MediaFetcher>,
    /// Global download slots; every run on this engine competes for the same permits
    slots: Arc<Semaphore>,
    download: DownloadConfig,
    retry: RetryConfig,
}

impl DownloadEngine {
    /// Engine with `config.download.max_concurrent_downloads` download slots
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero slot count or zero attempts.
    pub fn new(
        db: Arc<Database>,
        fetcher: Arc<dyn MediaFetcher>,
        config: &Config,
    ) -> Result<Self> {
        config.download.validate()?;
        config.retry.validate()?;
        Ok(Self {
            db,
            fetcher,
            slots: Arc::new(Semaphore::new(config.download.max_concurrent_downloads)),
            download: config.download.clone(),
            retry: config.retry.clone(),
        })
    }

    /// Slots not currently held by a fetch
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Check the record store for every member and size what is left to download
    ///
    /// Sizes are exact when the platform reports them; photos without a size count
    /// as the configured estimate. A stable id that appears on several members is
    /// planned once, for the first of them.
    pub async fn preflight(&self, set: &MediaSet) -> Result<Preflight> {
        let mut preflight = Preflight::default();
        let mut planned: HashSet<StableId> = HashSet::new();

        for message in set {
            let Some(media) = message.media.clone() else {
                continue;
            };
            if !planned.insert(media.stable_id.clone()) {
                tracing::debug!(
                    stable_id = %media.stable_id,
                    message_id = message.message_id,
                    "Media already planned for an earlier message, dropping duplicate"
                );
                continue;
            }

            let existing = self.existing_record(&media).await?;
            if existing.is_none() {
                preflight.total_size_bytes += self.expected_size(&media);
            }
            preflight.items.push(PlannedItem {
                message: message.clone(),
                media,
                existing,
            });
        }

        tracing::debug!(
            total_files = preflight.total_files(),
            pending_files = preflight.pending_files(),
            total_size_bytes = preflight.total_size_bytes,
            "Pre-flight sizing complete"
        );
        Ok(preflight)
    }

    /// Download a media set into `destination`
    ///
    /// Returns the local file names of every completed item (downloaded or skipped),
    /// in media-set order.
    pub async fn run(
        &self,
        set: &MediaSet,
        destination: &Path,
        stats: &Arc<AggregateStats>,
    ) -> Result<Vec<String>> {
        let preflight = self.preflight(set).await?;
        self.run_preflight(preflight, destination, stats).await
    }

    /// Download the items of an already computed [`Preflight`]
    pub async fn run_preflight(
        &self,
        preflight: Preflight,
        destination: &Path,
        stats: &Arc<AggregateStats>,
    ) -> Result<Vec<String>> {
        stats.set_totals(preflight.total_files() as u64, preflight.total_size_bytes);

        let concurrency = preflight.items.len().max(1);
        let outcomes: Vec<ItemOutcome> = stream::iter(preflight.items)
            .map(|item| self.process_item(item, destination, stats))
            .buffered(concurrency)
            .collect()
            .await;

        let mut files = Vec::with_capacity(outcomes.len());
        let mut storage_error = None;
        for outcome in outcomes {
            match outcome {
                ItemOutcome::Skipped(name) | ItemOutcome::Downloaded(name) => files.push(name),
                ItemOutcome::Failed => {}
                ItemOutcome::StorageFailed(e) => {
                    storage_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = storage_error {
            return Err(e);
        }
        Ok(files)
    }

    async fn process_item(
        &self,
        item: PlannedItem,
        destination: &Path,
        stats: &Arc<AggregateStats>,
    ) -> ItemOutcome {
        let PlannedItem {
            message,
            media,
            existing,
        } = item;

        if let Some(record) = existing {
            tracing::debug!(
                stable_id = %media.stable_id,
                file_name = %record.file_name,
                "Already downloaded, skipping"
            );
            stats.record_completed();
            return ItemOutcome::Skipped(record.file_name);
        }

        let _permit = match self.slots.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::error!(stable_id = %media.stable_id, error = %e, "Download slots closed");
                stats.record_failed();
                return ItemOutcome::Failed;
            }
        };

        let file_name = naming::file_name_for(&message, &media);
        let path = destination.join(&file_name);
        let progress = Arc::new(ItemProgress::new(Arc::clone(stats)));

        let result = self.fetch_with_retry(&media, &path, &progress).await;

        match result {
            Ok(bytes) => {
                // Fetchers that report nothing still credit the final size
                progress.update(bytes);
                let record = new_record(&message, &media, &file_name, &path, bytes);
                if let Err(e) = self.db.upsert(&record).await {
                    tracing::error!(
                        stable_id = %media.stable_id,
                        file_name = %file_name,
                        error = %e,
                        "Failed to record download"
                    );
                    stats.record_failed();
                    return ItemOutcome::StorageFailed(e);
                }

                stats.record_completed();
                tracing::info!(
                    stable_id = %media.stable_id,
                    file_name = %file_name,
                    size_bytes = bytes,
                    "Downloaded media"
                );
                ItemOutcome::Downloaded(file_name)
            }
            Err(e) => {
                progress.rollback();
                stats.record_failed();
                tracing::error!(
                    stable_id = %media.stable_id,
                    file_name = %file_name,
                    error = %e,
                    "Download failed"
                );
                remove_partial(&path).await;
                ItemOutcome::Failed
            }
        }
    }

    async fn fetch_with_retry(
        &self,
        media: &MediaItem,
        path: &Path,
        progress: &Arc<ItemProgress>,
    ) -> std::result::Result<u64, FetchError> {
        with_retry(&self.retry, |attempt| {
            let fetcher = Arc::clone(&self.fetcher);
            let progress = Arc::clone(progress);
            let media = media.clone();
            let path: PathBuf = path.to_path_buf();
            async move {
                // Bytes from an earlier failed attempt do not count
                progress.rollback();
                tracing::debug!(stable_id = %media.stable_id, attempt = attempt + 1, "Fetching media");

                let reporter = Arc::clone(&progress);
                let on_progress = move |bytes: u64| reporter.update(bytes);
                fetcher.fetch(&media, &path, &on_progress).await
            }
        })
        .await
    }

    /// Record for `media` whose file still exists
    ///
    /// A record pointing at a deleted file is stale: the item is downloaded again and
    /// the record overwritten.
    async fn existing_record(&self, media: &MediaItem) -> Result<Option<DownloadRecord>> {
        let Some(record) = self.db.lookup(&media.stable_id).await? else {
            return Ok(None);
        };

        if tokio::fs::try_exists(&record.local_path)
            .await
            .unwrap_or(false)
        {
            Ok(Some(record))
        } else {
            tracing::info!(
                stable_id = %media.stable_id,
                local_path = %record.local_path,
                "Recorded file is missing, downloading again"
            );
            Ok(None)
        }
    }

    fn expected_size(&self, media: &MediaItem) -> u64 {
        match (media.size_bytes, media.kind) {
            (Some(size), _) => size,
            (None, MediaKind::Photo) => self.download.photo_size_estimate,
            (None, MediaKind::Video | MediaKind::Document) => 0,
        }
    }
}

fn new_record(
    message: &MessageRef,
    media: &MediaItem,
    file_name: &str,
    path: &Path,
    bytes: u64,
) -> NewDownloadRecord {
    NewDownloadRecord {
        stable_id: media.stable_id.clone(),
        platform_file_ref: media.platform_file_ref.clone(),
        message_id: message.message_id,
        chat_id: message.chat_id,
        file_name: file_name.to_string(),
        original_name: media.suggested_name.clone(),
        local_path: path.to_string_lossy().into_owned(),
        size_bytes: i64::try_from(bytes).ok(),
        kind: media.kind,
        mime_type: media.mime_type.clone(),
        source_timestamp: Some(message.timestamp.timestamp()),
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial download")
        }
    }
}
