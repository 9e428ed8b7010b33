//! Reaper - periodic removal of stale upload artifacts
//!
//! Requests normally delete their own artifact. The reaper is the backstop for
//! requests that never finished (crash, panic, dropped connection): every
//! `interval` it lists the store and removes anything older than `max_age`.
//!
//! The loop is owned by the service lifecycle: [`Reaper::spawn`] returns a
//! [`ReaperHandle`] whose [`ReaperHandle::shutdown`] stops and joins the task.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::transient::{StorageError, TransientStore};

/// Outcome of a single sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct Reaper {
    store: TransientStore,
    interval: Duration,
    max_age: Duration,
}

impl Reaper {
    pub fn new(store: TransientStore, interval: Duration, max_age: Duration) -> Self {
        Self {
            store,
            interval,
            max_age,
        }
    }

    /// Remove every artifact whose age exceeds `max_age`.
    ///
    /// Per-entry failures are logged and counted; they never abort the sweep.
    pub async fn sweep(&self) -> Result<SweepReport, StorageError> {
        let entries = self.store.list_all().await?;
        let mut report = SweepReport {
            scanned: entries.len(),
            ..Default::default()
        };

        for entry in entries.into_iter().filter(|e| e.age > self.max_age) {
            match self.store.remove_path(&entry.path).await {
                Ok(()) => {
                    debug!("Reaped {:?} (age {}s)", entry.path, entry.age.as_secs());
                    report.removed += 1;
                }
                // Owning request finished first
                Err(StorageError::NotFound(_)) => {}
                Err(e) => {
                    error!("Failed to reap {:?}: {}", entry.path, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Start the sweep loop on the runtime. The first sweep happens one
    /// interval after start.
    pub fn spawn(self) -> ReaperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let start = Instant::now()
                .checked_add(self.interval)
                .filter(|_| !self.interval.is_zero());
            let Some(start) = start else {
                error!(
                    interval_secs = self.interval.as_secs(),
                    "Reaper interval is unusable; artifacts will not be reaped"
                );
                let _ = shutdown_rx.changed().await;
                return;
            };
            let mut ticker = interval_at(start, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                interval_secs = self.interval.as_secs(),
                max_age_secs = self.max_age.as_secs(),
                "Artifact reaper started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.sweep().await {
                            Ok(report) if report.removed > 0 || report.failed > 0 => {
                                info!(
                                    scanned = report.scanned,
                                    removed = report.removed,
                                    failed = report.failed,
                                    "Reaper sweep finished"
                                );
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Reaper sweep failed: {}", e),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Artifact reaper stopped");
        });

        ReaperHandle { shutdown_tx, task }
    }
}

/// Handle to a running reaper task.
pub struct ReaperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Signal the loop to stop and wait for it to exit.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        let _ = self.shutdown_tx.send(true);
        self.task.await
    }
}
