use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::channel::ChannelRegistry;
use crate::delivery_log::{DeliveryLogBackend, DeliveryLogEntry, DeliveryLogError};
use crate::directory::UserDirectory;
use crate::metrics::RecoveryMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryConfig {
    pub interval: Duration,
    /// Minimum age of a pending row before the sweep takes it over.
    pub stale_after: Duration,
    pub batch_size: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            stale_after: Duration::from_secs(300),
            batch_size: 100,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecoveryConfigError {
    #[error("stale threshold {stale_after:?} must exceed the retry window {retry_window:?}")]
    StaleThresholdTooShort {
        stale_after: Duration,
        retry_window: Duration,
    },

    #[error("batch size must be at least 1")]
    EmptyBatch,
}

impl RecoveryConfig {
    /// A row still inside its retry window must never be swept.
    pub fn validate(&self, retry_window: Duration) -> Result<(), RecoveryConfigError> {
        if self.stale_after <= retry_window {
            return Err(RecoveryConfigError::StaleThresholdTooShort {
                stale_after: self.stale_after,
                retry_window,
            });
        }
        if self.batch_size == 0 {
            return Err(RecoveryConfigError::EmptyBatch);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub sent: usize,
    pub failed: usize,
    /// Rows finalized by a worker between the scan and this sweep's update.
    pub already_finalized: usize,
    /// Rows that hit a storage error; still pending.
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SweepOutcome {
    /// Another sweep was still running.
    Skipped,
    Completed(SweepReport),
}

enum RowOutcome {
    Sent,
    Failed,
    AlreadyFinalized,
    Error,
}

/// Clears the running flag when a sweep ends, including on panic.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodic task that finalizes delivery log rows left pending by lost or
/// crashed jobs. Stale rows are delivered directly, without the job queue.
pub struct RecoverySweep {
    registry: Arc<ChannelRegistry>,
    users: Arc<dyn UserDirectory>,
    logs: Arc<dyn DeliveryLogBackend>,
    config: RecoveryConfig,
    running: AtomicBool,
}

impl RecoverySweep {
    pub fn new(
        registry: Arc<ChannelRegistry>,
        users: Arc<dyn UserDirectory>,
        logs: Arc<dyn DeliveryLogBackend>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            registry,
            users,
            logs,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one sweep, unless one is already in progress.
    pub async fn run_once(&self) -> Result<SweepOutcome, DeliveryLogError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            RecoveryMetrics::record_skipped();
            tracing::debug!("Recovery sweep already running, skipping");
            return Ok(SweepOutcome::Skipped);
        }
        let _guard = RunningGuard(&self.running);

        let started = Instant::now();
        let stale_after = chrono::Duration::from_std(self.config.stale_after)
            .unwrap_or_else(|_| chrono::Duration::seconds(300));
        let cutoff = Utc::now() - stale_after;

        let rows = match self
            .logs
            .find_stale_pending(cutoff, self.config.batch_size)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                RecoveryMetrics::record_error();
                return Err(e);
            }
        };

        let mut report = SweepReport {
            examined: rows.len(),
            ..Default::default()
        };

        for row in rows {
            match self.recover_row(&row).await {
                RowOutcome::Sent => report.sent += 1,
                RowOutcome::Failed => report.failed += 1,
                RowOutcome::AlreadyFinalized => report.already_finalized += 1,
                RowOutcome::Error => report.errors += 1,
            }
        }

        RecoveryMetrics::record_completed(
            report.sent as u64,
            report.failed as u64,
            report.already_finalized as u64,
            started.elapsed().as_secs_f64(),
        );
        if report.examined > 0 {
            tracing::info!(
                examined = report.examined,
                sent = report.sent,
                failed = report.failed,
                already_finalized = report.already_finalized,
                errors = report.errors,
                "Recovery sweep completed"
            );
        }

        Ok(SweepOutcome::Completed(report))
    }

    /// Tick every `interval` until shutdown. Each run is spawned so a slow
    /// sweep makes the next tick skip instead of piling up.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut timer = tokio::time::interval(self.config.interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Skip immediate first tick
        timer.tick().await;

        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            stale_after_secs = self.config.stale_after.as_secs(),
            batch_size = self.config.batch_size,
            "Recovery sweep started"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Recovery sweep received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    let sweep = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = sweep.run_once().await {
                            tracing::error!(error = %e, "Recovery sweep failed");
                        }
                    });
                }
            }
        }

        tracing::info!("Recovery sweep stopped");
    }

    async fn recover_row(&self, row: &DeliveryLogEntry) -> RowOutcome {
        let channel = match self.registry.get(&row.channel_id) {
            Ok(channel) => channel,
            Err(_) => {
                let reason = format!("Channel {} not registered", row.channel_id);
                return self.finalize_failed(row, &reason).await;
            }
        };

        let user = match self.users.find_by_id(&row.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return self.finalize_failed(row, "User not found").await,
            Err(e) => {
                tracing::warn!(log_id = %row.id, error = %e, "User lookup failed, row stays pending");
                return RowOutcome::Error;
            }
        };

        let payload = match row.decode_payload() {
            Ok(payload) => payload,
            Err(e) => {
                let reason = format!("Payload {} could not be reconstructed: {}", row.payload_kind, e);
                return self.finalize_failed(row, &reason).await;
            }
        };

        match channel.send(&user, &payload).await {
            Ok(()) => match self.logs.mark_sent(row.id, Utc::now()).await {
                Ok(true) => {
                    tracing::info!(log_id = %row.id, channel = %row.channel_id, "Recovered stale notification");
                    RowOutcome::Sent
                }
                Ok(false) => RowOutcome::AlreadyFinalized,
                Err(e) => {
                    tracing::error!(log_id = %row.id, error = %e, "Failed to mark recovered row sent");
                    RowOutcome::Error
                }
            },
            Err(e) => self.finalize_failed(row, &e.to_string()).await,
        }
    }

    async fn finalize_failed(&self, row: &DeliveryLogEntry, reason: &str) -> RowOutcome {
        match self.logs.mark_failed(row.id, reason).await {
            Ok(true) => {
                tracing::warn!(
                    log_id = %row.id,
                    channel = %row.channel_id,
                    reason = %reason,
                    "Stale notification marked failed"
                );
                RowOutcome::Failed
            }
            Ok(false) => RowOutcome::AlreadyFinalized,
            Err(e) => {
                tracing::error!(log_id = %row.id, error = %e, "Failed to mark stale row failed");
                RowOutcome::Error
            }
        }
    }
}
