//! Progress monitor
//!
//! A background task samples [`AggregateStats`] and the destination's free space on
//! a fixed cadence and hands formatted status text to a [`StatusSink`].
//!
//! The polling task never calls the sink itself. Status text crosses a bounded
//! channel to a dispatcher task, so a slow sink cannot stall polling; when the
//! channel is full the newest text is dropped and the next tick tries again.

use crate::config::MonitorConfig;
use crate::error::{Result, SinkError};
use crate::stats::{AggregateStats, StatsSnapshot};
use crate::utils::{self, DiskUsage, bytes_to_mb};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Receiver of human-readable status text (for example a chat message that is edited)
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Replace the displayed status with `text`
    ///
    /// Return [`SinkError::NotModified`] when the text is already displayed.
    async fn update(&self, text: &str) -> std::result::Result<(), SinkError>;
}

/// Deliver one status text, logging and swallowing every failure
pub async fn dispatch_status(sink: &dyn StatusSink, text: &str) {
    match sink.update(text).await {
        Ok(()) => {}
        Err(SinkError::NotModified) => {
            tracing::debug!("Status unchanged, skipping update");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to deliver status update");
        }
    }
}

/// Background tasks of a running monitor
struct RunningMonitor {
    cancel: CancellationToken,
    poller: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

/// Idle/running state machine around the polling task
pub struct ProgressMonitor {
    config: MonitorConfig,
    running: Option<RunningMonitor>,
}

impl ProgressMonitor {
    /// Monitor that is not yet running
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) for a zero poll interval or a
    /// zero-capacity status channel.
    pub fn new(config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            running: None,
        })
    }

    /// Whether [`ProgressMonitor::start`] was called without a matching stop
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Start polling `stats` for `destination`, pushing status text to `sink`
    ///
    /// Starting a monitor that is already running does nothing.
    pub fn start(
        &mut self,
        destination: PathBuf,
        stats: Arc<AggregateStats>,
        sink: Arc<dyn StatusSink>,
    ) {
        if self.running.is_some() {
            tracing::warn!("Progress monitor already running");
            return;
        }

        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = mpsc::channel(self.config.status_buffer);

        let dispatcher = spawn_dispatcher(status_rx, sink);
        let poller = spawn_poller(
            self.config.clone(),
            destination,
            stats,
            status_tx,
            cancel.clone(),
        );

        tracing::info!("Progress monitor started");
        self.running = Some(RunningMonitor {
            cancel,
            poller,
            dispatcher,
        });
    }

    /// Stop polling and wait for queued status text to be delivered
    ///
    /// The poller notices the stop at its next wake-up; an iteration in progress is
    /// finished first. Stopping an idle monitor does nothing.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.cancel.cancel();
        if let Err(e) = running.poller.await {
            tracing::error!(error = %e, "Progress poller panicked");
        }
        // The poller owned the only sender, so the dispatcher drains and exits
        if let Err(e) = running.dispatcher.await {
            tracing::error!(error = %e, "Status dispatcher panicked");
        }
        tracing::info!("Progress monitor stopped");
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.cancel.cancel();
        }
    }
}

fn spawn_dispatcher(
    mut status_rx: mpsc::Receiver<String>,
    sink: Arc<dyn StatusSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(text) = status_rx.recv().await {
            dispatch_status(sink.as_ref(), &text).await;
        }
    })
}

fn spawn_poller(
    config: MonitorConfig,
    destination: PathBuf,
    stats: Arc<AggregateStats>,
    status_tx: mpsc::Sender<String>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_emit = Instant::now();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            if last_emit.elapsed() < config.update_interval {
                continue;
            }
            last_emit = Instant::now();

            let snapshot = stats.snapshot();
            let disk = match utils::disk_usage(&destination) {
                Ok(usage) => Some(usage),
                Err(e) => {
                    tracing::debug!(path = %destination.display(), error = %e, "Failed to read disk usage");
                    None
                }
            };

            tracing::info!(
                completed = snapshot.completed_files,
                failed = snapshot.failed_files,
                speed_mb_s = bytes_to_mb(snapshot.speed_bytes_per_sec() as u64),
                free_gb = disk.map(|d| d.free_gb()),
                "Download status"
            );

            match status_tx.try_send(format_status(&snapshot, disk.as_ref())) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::debug!("Status sink busy, dropping update");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!("Status dispatcher gone, stopping poller");
                    break;
                }
            }
        }
    })
}

/// Format the in-progress status text
pub fn format_status(snapshot: &StatsSnapshot, disk: Option<&DiskUsage>) -> String {
    let mut text = format!(
        "⬇️ Backup in progress...\n\
         Completed: {}/{} files\n\
         Failed: {}\n\
         Progress: {:.1}MB / {:.1}MB ({:.1}%)\n\
         Speed: {:.1}MB/s",
        snapshot.completed_files,
        snapshot.total_files,
        snapshot.failed_files,
        bytes_to_mb(snapshot.downloaded_size_bytes),
        bytes_to_mb(snapshot.total_size_bytes),
        snapshot.percent(),
        snapshot.speed_bytes_per_sec() / (1024.0 * 1024.0),
    );

    if let Some(eta) = snapshot.eta() {
        text.push_str(&format!("\nETA: {}", format_duration(eta.as_secs())));
    }
    if let Some(disk) = disk {
        text.push_str(&format!("\nFree space: {:.1}GB", disk.free_gb()));
    }
    text
}

/// `1h 02m 03s` / `2m 03s` / `3s`
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}
