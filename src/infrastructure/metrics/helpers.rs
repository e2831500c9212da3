//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    BACKEND_ERRORS_TOTAL, BACKEND_OPERATION_LATENCY, DELIVERY_ATTEMPTS_TOTAL, DELIVERY_LATENCY,
    DISPATCH_CHANNEL_OUTCOMES_TOTAL, DISPATCH_TOTAL, QUEUE_CONSUMED_TOTAL, QUEUE_DELAYED,
    QUEUE_DROPPED_TOTAL, QUEUE_ENQUEUED_TOTAL, RECOVERY_ROWS_TOTAL, RECOVERY_SWEEPS_TOTAL,
    RECOVERY_SWEEP_DURATION,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording dispatch metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    pub fn record_dispatched(event_type: &str) {
        DISPATCH_TOTAL.with_label_values(&[event_type]).inc();
    }

    pub fn record_queued(count: u64) {
        DISPATCH_CHANNEL_OUTCOMES_TOTAL
            .with_label_values(&["queued"])
            .inc_by(count);
    }

    /// Channel skipped because the user opted out
    pub fn record_skipped(count: u64) {
        DISPATCH_CHANNEL_OUTCOMES_TOTAL
            .with_label_values(&["skipped"])
            .inc_by(count);
    }

    /// Log row could not be created
    pub fn record_log_failed() {
        DISPATCH_CHANNEL_OUTCOMES_TOTAL
            .with_label_values(&["log_failed"])
            .inc();
    }

    /// Row created but the job could not be enqueued; left for recovery
    pub fn record_enqueue_failed() {
        DISPATCH_CHANNEL_OUTCOMES_TOTAL
            .with_label_values(&["enqueue_failed"])
            .inc();
    }
}

/// Helper struct for recording delivery attempt metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    pub fn record_sent(channel: &str, latency_secs: f64) {
        DELIVERY_ATTEMPTS_TOTAL
            .with_label_values(&[channel, "sent"])
            .inc();
        DELIVERY_LATENCY
            .with_label_values(&[channel])
            .observe(latency_secs);
    }

    pub fn record_retry(channel: &str) {
        DELIVERY_ATTEMPTS_TOTAL
            .with_label_values(&[channel, "retry"])
            .inc();
    }

    pub fn record_failed(channel: &str) {
        DELIVERY_ATTEMPTS_TOTAL
            .with_label_values(&[channel, "failed"])
            .inc();
    }

    /// Attempt found its row already finalized by another actor
    pub fn record_already_finalized(channel: &str) {
        DELIVERY_ATTEMPTS_TOTAL
            .with_label_values(&[channel, "finalized"])
            .inc();
    }
}

/// Helper struct for job queue metrics
pub struct QueueMetrics;

impl QueueMetrics {
    pub fn record_enqueued() {
        QUEUE_ENQUEUED_TOTAL.inc();
    }

    pub fn record_delay_started() {
        QUEUE_DELAYED.inc();
    }

    pub fn record_delay_finished() {
        QUEUE_DELAYED.dec();
    }

    pub fn record_consumed() {
        QUEUE_CONSUMED_TOTAL.inc();
    }

    pub fn record_dropped() {
        QUEUE_DROPPED_TOTAL.inc();
    }
}

/// Helper struct for recovery sweep metrics
pub struct RecoveryMetrics;

impl RecoveryMetrics {
    pub fn record_skipped() {
        RECOVERY_SWEEPS_TOTAL.with_label_values(&["skipped"]).inc();
    }

    pub fn record_error() {
        RECOVERY_SWEEPS_TOTAL.with_label_values(&["error"]).inc();
    }

    /// Record a completed sweep and its per-row outcomes
    pub fn record_completed(sent: u64, failed: u64, already_finalized: u64, duration_secs: f64) {
        RECOVERY_SWEEPS_TOTAL.with_label_values(&["completed"]).inc();
        RECOVERY_ROWS_TOTAL.with_label_values(&["sent"]).inc_by(sent);
        RECOVERY_ROWS_TOTAL.with_label_values(&["failed"]).inc_by(failed);
        RECOVERY_ROWS_TOTAL
            .with_label_values(&["finalized"])
            .inc_by(already_finalized);
        RECOVERY_SWEEP_DURATION.observe(duration_secs);
    }
}

/// Helper struct for backend metrics
pub struct BackendMetrics;

impl BackendMetrics {
    /// Record backend operation latency
    pub fn record_latency(backend: &str, operation: &str, latency_secs: f64) {
        BACKEND_OPERATION_LATENCY
            .with_label_values(&[backend, operation])
            .observe(latency_secs);
    }

    /// Record backend error
    pub fn record_error(backend: &str, operation: &str) {
        BACKEND_ERRORS_TOTAL
            .with_label_values(&[backend, operation])
            .inc();
    }
}
