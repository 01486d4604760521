//! Per-run progress counters shared between the download engine and the monitor
//!
//! [`AggregateStats`] is created by the coordinator for one run and handed out as an
//! `Arc`. Writers only use atomic operations, so concurrent fetch tasks never lose an
//! increment. Readers take a [`StatsSnapshot`] by value.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Mutable counters for one ingestion run
#[derive(Debug)]
pub struct AggregateStats {
    total_files: AtomicU64,
    completed_files: AtomicU64,
    failed_files: AtomicU64,
    total_size_bytes: AtomicU64,
    downloaded_size_bytes: AtomicU64,
    started_at: Instant,
    started_at_utc: DateTime<Utc>,
}

impl Default for AggregateStats {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateStats {
    /// Fresh counters, with the run clock starting now
    pub fn new() -> Self {
        Self {
            total_files: AtomicU64::new(0),
            completed_files: AtomicU64::new(0),
            failed_files: AtomicU64::new(0),
            total_size_bytes: AtomicU64::new(0),
            downloaded_size_bytes: AtomicU64::new(0),
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
        }
    }

    /// Set the expected file count and byte total from the pre-flight size probe
    pub fn set_totals(&self, total_files: u64, total_size_bytes: u64) {
        self.total_files.store(total_files, Ordering::SeqCst);
        self.total_size_bytes.store(total_size_bytes, Ordering::SeqCst);
    }

    /// Count one finished (or skipped) item
    pub fn record_completed(&self) {
        self.completed_files.fetch_add(1, Ordering::SeqCst);
    }

    /// Count one item that ran out of attempts
    pub fn record_failed(&self) {
        self.failed_files.fetch_add(1, Ordering::SeqCst);
    }

    /// Add freshly received bytes
    pub fn add_downloaded(&self, bytes: u64) {
        self.downloaded_size_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Take back bytes reported by an attempt that did not finish
    pub fn sub_downloaded(&self, bytes: u64) {
        // fetch_update retries until no concurrent writer interferes; never underflows
        let _ = self
            .downloaded_size_bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(bytes))
            });
    }

    /// Wall-clock time the run started
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at_utc
    }

    /// Read every counter into a consistent-enough value
    ///
    /// Once a total is known, `downloaded_size_bytes` is clamped to it: photo sizes are
    /// estimates, so the real byte count can overshoot the probe.
    pub fn snapshot(&self) -> StatsSnapshot {
        let total_size_bytes = self.total_size_bytes.load(Ordering::SeqCst);
        let mut downloaded_size_bytes = self.downloaded_size_bytes.load(Ordering::Relaxed);
        if total_size_bytes > 0 {
            downloaded_size_bytes = downloaded_size_bytes.min(total_size_bytes);
        }

        StatsSnapshot {
            total_files: self.total_files.load(Ordering::SeqCst),
            completed_files: self.completed_files.load(Ordering::SeqCst),
            failed_files: self.failed_files.load(Ordering::SeqCst),
            total_size_bytes,
            downloaded_size_bytes,
            elapsed: self.started_at.elapsed(),
        }
    }
}

/// Point-in-time copy of [`AggregateStats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Items in the run
    pub total_files: u64,
    /// Items downloaded or skipped as already present
    pub completed_files: u64,
    /// Items that gave up
    pub failed_files: u64,
    /// Expected bytes for the run
    pub total_size_bytes: u64,
    /// Bytes written so far
    pub downloaded_size_bytes: u64,
    /// Time since the run started
    pub elapsed: Duration,
}

impl StatsSnapshot {
    /// Average throughput since the run started, in bytes per second
    pub fn speed_bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.downloaded_size_bytes as f64 / secs
        } else {
            0.0
        }
    }

    /// Completion percentage by bytes, 0 when no total is known
    pub fn percent(&self) -> f64 {
        if self.total_size_bytes == 0 {
            return 0.0;
        }
        self.downloaded_size_bytes as f64 / self.total_size_bytes as f64 * 100.0
    }

    /// Estimated time remaining at the current average speed
    ///
    /// `None` while nothing has been downloaded yet or no total is known.
    pub fn eta(&self) -> Option<Duration> {
        let speed = self.speed_bytes_per_sec();
        if speed <= 0.0 || self.total_size_bytes == 0 {
            return None;
        }
        let remaining = self
            .total_size_bytes
            .saturating_sub(self.downloaded_size_bytes);
        Some(Duration::from_secs_f64(remaining as f64 / speed))
    }

    /// Files that have reached a final state
    pub fn finished_files(&self) -> u64 {
        self.completed_files + self.failed_files
    }
}

/// Progress tracker for one item's fetch attempt
///
/// Fetchers report cumulative byte counts; this turns them into deltas on the shared
/// counters and can take them all back when the attempt fails.
#[derive(Debug)]
pub struct ItemProgress {
    stats: Arc<AggregateStats>,
    reported: AtomicU64,
}

impl ItemProgress {
    /// Tracker for one item, reporting into `stats`
    pub fn new(stats: Arc<AggregateStats>) -> Self {
        Self {
            stats,
            reported: AtomicU64::new(0),
        }
    }

    /// Record that `bytes_so_far` bytes of this item have arrived
    pub fn update(&self, bytes_so_far: u64) {
        let previous = self.reported.swap(bytes_so_far, Ordering::Relaxed);
        if bytes_so_far >= previous {
            self.stats.add_downloaded(bytes_so_far - previous);
        } else {
            self.stats.sub_downloaded(previous - bytes_so_far);
        }
    }

    /// Bytes currently credited to this item
    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }

    /// Remove everything this item reported
    pub fn rollback(&self) {
        let previous = self.reported.swap(0, Ordering::Relaxed);
        self.stats.sub_downloaded(previous);
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stats_are_zeroed() {
        let snapshot = AggregateStats::new().snapshot();
        assert_eq!(snapshot.total_files, 0);
        assert_eq!(snapshot.completed_files, 0);
        assert_eq!(snapshot.failed_files, 0);
        assert_eq!(snapshot.downloaded_size_bytes, 0);
        assert_eq!(snapshot.percent(), 0.0);
        assert_eq!(snapshot.eta(), None);
    }

    #[test]
    fn snapshot_clamps_downloaded_to_total() {
        let stats = AggregateStats::new();
        stats.set_totals(1, 500_000);
        stats.add_downloaded(612_345);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.downloaded_size_bytes, 500_000);
        assert_eq!(snapshot.percent(), 100.0);
    }

    #[test]
    fn snapshot_without_total_is_not_clamped() {
        let stats = AggregateStats::new();
        stats.add_downloaded(1234);
        assert_eq!(stats.snapshot().downloaded_size_bytes, 1234);
    }

    #[test]
    fn sub_downloaded_saturates_at_zero() {
        let stats = AggregateStats::new();
        stats.add_downloaded(10);
        stats.sub_downloaded(25);
        assert_eq!(stats.snapshot().downloaded_size_bytes, 0);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let stats = Arc::new(AggregateStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_completed();
                        stats.add_downloaded(2);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.completed_files, 8000);
        assert_eq!(snapshot.downloaded_size_bytes, 16000);
    }

    #[test]
    fn item_progress_reports_deltas_and_rolls_back() {
        let stats = Arc::new(AggregateStats::new());
        stats.add_downloaded(100); // another item's bytes

        let item = ItemProgress::new(stats.clone());
        item.update(40);
        item.update(90);
        assert_eq!(stats.snapshot().downloaded_size_bytes, 190);
        assert_eq!(item.reported(), 90);

        item.rollback();
        assert_eq!(stats.snapshot().downloaded_size_bytes, 100);
        assert_eq!(item.reported(), 0);

        // a fresh attempt starts counting again from zero
        item.update(30);
        assert_eq!(stats.snapshot().downloaded_size_bytes, 130);
    }

    #[test]
    fn eta_uses_average_speed() {
        let snapshot = StatsSnapshot {
            total_size_bytes: 300,
            downloaded_size_bytes: 100,
            elapsed: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(snapshot.speed_bytes_per_sec(), 10.0);
        assert_eq!(snapshot.eta(), Some(Duration::from_secs(20)));
    }
}
