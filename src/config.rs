//! Configuration types for chat-media-backup

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Download engine configuration (concurrency, sizing, persistence)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Maximum concurrent media fetches across the whole engine (default: 5)
    ///
    /// This is a global slot count shared by every run on the same engine, not a
    /// per-run allowance.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Size assumed for a photo when the platform reports no exact size (default: 500 KB)
    #[serde(default = "default_photo_size_estimate")]
    pub photo_size_estimate: u64,

    /// SQLite database path for the download record store (default: "downloads.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: default_max_concurrent(),
            photo_size_estimate: default_photo_size_estimate(),
            database_path: default_database_path(),
        }
    }
}

/// Retry configuration for transient fetch failures
///
/// The delay before the retry that follows failed attempt `a` (0-based) is
/// `base_delay * 2^a + delay_offset`, capped at `max_delay`. With the defaults this
/// gives 2s, 3s, 5s.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts per item, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay that doubles with every attempt (default: 1 second)
    #[serde(default = "default_base_delay", with = "duration_serde")]
    pub base_delay: Duration,

    /// Constant added to every backoff delay (default: 1 second)
    #[serde(default = "default_delay_offset", with = "duration_serde")]
    pub delay_offset: Duration,

    /// Maximum delay between attempts (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            delay_offset: default_delay_offset(),
            max_delay: default_max_delay(),
            jitter: false,
        }
    }
}

/// Media-set resolver configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Half-width of the message id window searched around the trigger (default: 50)
    #[serde(default = "default_search_window")]
    pub search_window: i64,

    /// Number of recent messages scanned when the window holds no group sibling (default: 200)
    #[serde(default = "default_recent_scan_limit")]
    pub recent_scan_limit: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            search_window: default_search_window(),
            recent_scan_limit: default_recent_scan_limit(),
        }
    }
}

/// Progress monitor configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// How often the monitor wakes up to sample statistics (default: 1 second)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Minimum time between two status updates pushed to the sink (default: 5 seconds)
    #[serde(default = "default_update_interval", with = "duration_serde")]
    pub update_interval: Duration,

    /// Capacity of the channel between the monitor and the sink dispatcher (default: 8)
    ///
    /// When the dispatcher falls behind, new status texts are dropped rather than
    /// blocking the polling loop.
    #[serde(default = "default_status_buffer")]
    pub status_buffer: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            update_interval: default_update_interval(),
            status_buffer: default_status_buffer(),
        }
    }
}

/// Main configuration for the ingestion pipeline
///
/// Every field has a sensible default, so `Config::default()` is a working setup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download engine settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry behaviour for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Media-set resolution heuristics
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Progress monitor cadence
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl DownloadConfig {
    /// Reject a zero slot count, which would leave every fetch waiting forever
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_downloads == 0 {
            return Err(config_error(
                "max_concurrent_downloads must be at least 1",
                "max_concurrent_downloads",
            ));
        }
        Ok(())
    }
}

impl RetryConfig {
    /// Reject settings that would never attempt a fetch
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(config_error(
                "max_attempts must be at least 1",
                "max_attempts",
            ));
        }
        Ok(())
    }
}

impl ResolverConfig {
    /// Reject an empty search window
    pub fn validate(&self) -> Result<()> {
        if self.search_window <= 0 {
            return Err(config_error(
                "search_window must be positive",
                "search_window",
            ));
        }
        Ok(())
    }
}

impl MonitorConfig {
    /// Reject a zero poll interval or a zero-capacity status channel
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(config_error(
                "poll_interval must be greater than zero",
                "poll_interval",
            ));
        }
        if self.status_buffer == 0 {
            return Err(config_error(
                "status_buffer must be at least 1",
                "status_buffer",
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Reject settings that would stall or disable the pipeline
    pub fn validate(&self) -> Result<()> {
        self.download.validate()?;
        self.retry.validate()?;
        self.resolver.validate()?;
        self.monitor.validate()
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn default_max_concurrent() -> usize {
    5
}

fn default_photo_size_estimate() -> u64 {
    500_000
}

fn default_database_path() -> PathBuf {
    PathBuf::from("downloads.db")
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_delay_offset() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_search_window() -> i64 {
    50
}

fn default_recent_scan_limit() -> usize {
    200
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_update_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_status_buffer() -> usize {
    8
}

// Duration serialization helper (whole seconds)
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
