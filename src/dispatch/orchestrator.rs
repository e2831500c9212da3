use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use uuid::Uuid;

use crate::channel::{ChannelRegistry, NotificationChannel};
use crate::delivery_log::{DeliveryLogBackend, DeliveryLogEntry};
use crate::metrics::DispatchMetrics;
use crate::notification::{EventType, NotificationPayload};
use crate::preference::PreferenceService;
use crate::queue::{DeliveryJob, JobQueue};

/// A channel that got a pending log row and a queued job.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedDelivery {
    pub channel_id: String,
    pub log_id: Uuid,
}

/// Per-channel outcome of one dispatch call.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub event_type: EventType,
    pub queued: Vec<QueuedDelivery>,
    /// Channels the user opted out of.
    pub skipped: Vec<String>,
    /// Channels whose log row could not be created. No job was enqueued.
    pub failed_to_create: Vec<String>,
    /// Rows that exist but whose job could not be enqueued. Left for recovery.
    pub enqueue_failed: Vec<QueuedDelivery>,
}

impl DispatchReport {
    fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            queued: Vec::new(),
            skipped: Vec::new(),
            failed_to_create: Vec::new(),
            enqueue_failed: Vec::new(),
        }
    }

    /// Number of pending rows this dispatch created.
    pub fn rows_created(&self) -> usize {
        self.queued.len() + self.enqueue_failed.len()
    }
}

enum ChannelOutcome {
    Queued(QueuedDelivery),
    Skipped(String),
    LogFailed(String),
    EnqueueFailed(QueuedDelivery),
}

/// Statistics for the notification dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    pub total_dispatched: AtomicU64,
    pub total_queued: AtomicU64,
    pub total_skipped: AtomicU64,
    pub total_log_failures: AtomicU64,
    pub total_enqueue_failures: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            total_dispatched: self.total_dispatched.load(Ordering::Relaxed),
            total_queued: self.total_queued.load(Ordering::Relaxed),
            total_skipped: self.total_skipped.load(Ordering::Relaxed),
            total_log_failures: self.total_log_failures.load(Ordering::Relaxed),
            total_enqueue_failures: self.total_enqueue_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub total_dispatched: u64,
    pub total_queued: u64,
    pub total_skipped: u64,
    pub total_log_failures: u64,
    pub total_enqueue_failures: u64,
}

/// Fans a notification out to every applicable, enabled channel.
///
/// For each channel the dispatcher first persists a pending log row and only
/// then enqueues the delivery job, so every queued job has a row to finalize
/// and every row without a job is eventually picked up by the recovery sweep.
pub struct NotificationDispatcher {
    registry: Arc<ChannelRegistry>,
    preferences: Arc<PreferenceService>,
    logs: Arc<dyn DeliveryLogBackend>,
    queue: Arc<dyn JobQueue>,
    stats: DispatcherStats,
}

impl NotificationDispatcher {
    pub fn new(
        registry: Arc<ChannelRegistry>,
        preferences: Arc<PreferenceService>,
        logs: Arc<dyn DeliveryLogBackend>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            registry,
            preferences,
            logs,
            queue,
            stats: DispatcherStats::default(),
        }
    }

    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    #[tracing::instrument(
        name = "dispatcher.dispatch",
        skip(self, payload),
        fields(event_type = %payload.event_type(), queue = %self.queue.name())
    )]
    pub async fn dispatch(&self, user_id: &str, payload: NotificationPayload) -> DispatchReport {
        let event_type = payload.event_type();
        let channels = self.registry.channels_for_event(event_type);

        let outcomes = join_all(
            channels
                .iter()
                .map(|(channel_id, channel)| self.dispatch_to_channel(user_id, channel_id, channel, &payload)),
        )
        .await;

        let mut report = DispatchReport::new(event_type);
        for outcome in outcomes {
            match outcome {
                ChannelOutcome::Queued(q) => report.queued.push(q),
                ChannelOutcome::Skipped(c) => report.skipped.push(c),
                ChannelOutcome::LogFailed(c) => report.failed_to_create.push(c),
                ChannelOutcome::EnqueueFailed(q) => report.enqueue_failed.push(q),
            }
        }

        self.stats.total_dispatched.fetch_add(1, Ordering::Relaxed);
        self.stats
            .total_queued
            .fetch_add(report.queued.len() as u64, Ordering::Relaxed);
        self.stats
            .total_skipped
            .fetch_add(report.skipped.len() as u64, Ordering::Relaxed);
        self.stats
            .total_log_failures
            .fetch_add(report.failed_to_create.len() as u64, Ordering::Relaxed);
        self.stats
            .total_enqueue_failures
            .fetch_add(report.enqueue_failed.len() as u64, Ordering::Relaxed);

        DispatchMetrics::record_dispatched(event_type.as_str());
        DispatchMetrics::record_queued(report.queued.len() as u64);
        DispatchMetrics::record_skipped(report.skipped.len() as u64);

        tracing::info!(
            user_id = %user_id,
            event_type = %event_type,
            queued = report.queued.len(),
            skipped = report.skipped.len(),
            failed_to_create = report.failed_to_create.len(),
            enqueue_failed = report.enqueue_failed.len(),
            "Dispatched notification"
        );

        report
    }

    async fn dispatch_to_channel(
        &self,
        user_id: &str,
        channel_id: &str,
        channel: &Arc<dyn NotificationChannel>,
        payload: &NotificationPayload,
    ) -> ChannelOutcome {
        let event_type = payload.event_type();
        debug_assert!(channel.supports(event_type));

        if !self
            .preferences
            .is_enabled(user_id, channel_id, event_type)
            .await
        {
            tracing::debug!(
                user_id = %user_id,
                channel = %channel_id,
                event_type = %event_type,
                "Channel disabled by user preference"
            );
            return ChannelOutcome::Skipped(channel_id.to_string());
        }

        let entry = match DeliveryLogEntry::pending(user_id, channel_id, payload) {
            Ok(entry) => entry,
            Err(e) => {
                DispatchMetrics::record_log_failed();
                tracing::error!(
                    user_id = %user_id,
                    channel = %channel_id,
                    error = %e,
                    "Failed to serialize payload for delivery log"
                );
                return ChannelOutcome::LogFailed(channel_id.to_string());
            }
        };
        let log_id = entry.id;

        if let Err(e) = self.logs.create_pending(entry).await {
            DispatchMetrics::record_log_failed();
            tracing::error!(
                user_id = %user_id,
                channel = %channel_id,
                error = %e,
                "Failed to create delivery log row"
            );
            return ChannelOutcome::LogFailed(channel_id.to_string());
        }

        let delivery = QueuedDelivery {
            channel_id: channel_id.to_string(),
            log_id,
        };
        let job = DeliveryJob::new(log_id, user_id, channel_id, payload.clone());

        match self.queue.enqueue(job, Duration::ZERO).await {
            Ok(()) => ChannelOutcome::Queued(delivery),
            Err(e) => {
                DispatchMetrics::record_enqueue_failed();
                tracing::warn!(
                    user_id = %user_id,
                    channel = %channel_id,
                    log_id = %log_id,
                    error = %e,
                    "Failed to enqueue delivery job, row left pending for recovery"
                );
                ChannelOutcome::EnqueueFailed(delivery)
            }
        }
    }
}
