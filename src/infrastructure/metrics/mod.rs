//! Prometheus metrics for the notification service.
//!
//! - Dispatch metrics (notifications dispatched, per-channel fan-out outcomes)
//! - Delivery metrics (attempts by channel and result, send latency)
//! - Job queue metrics
//! - Recovery sweep metrics
//! - Storage backend metrics

mod helpers;

pub use helpers::{
    encode_metrics, BackendMetrics, DeliveryMetrics, DispatchMetrics, QueueMetrics,
    RecoveryMetrics,
};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, register_int_gauge_vec, Histogram, HistogramVec, IntCounter,
    IntCounterVec, IntGauge, IntGaugeVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "security_notify";

lazy_static! {
    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Notifications handed to the dispatcher, by event type
    pub static ref DISPATCH_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_total", METRIC_PREFIX),
        "Total notifications dispatched",
        &["event_type"]
    ).unwrap();

    /// Per-channel fan-out outcomes (queued, skipped, log_failed, enqueue_failed)
    pub static ref DISPATCH_CHANNEL_OUTCOMES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_channel_outcomes_total", METRIC_PREFIX),
        "Per-channel dispatch outcomes",
        &["outcome"]
    ).unwrap();

    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Delivery attempts by channel and result (sent, retry, failed, finalized)
    pub static ref DELIVERY_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_delivery_attempts_total", METRIC_PREFIX),
        "Total delivery attempts",
        &["channel", "result"]
    ).unwrap();

    /// Channel send latency
    pub static ref DELIVERY_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_delivery_latency_seconds", METRIC_PREFIX),
        "Channel send latency in seconds",
        &["channel"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
    ).unwrap();

    // ============================================================================
    // Queue Metrics
    // ============================================================================

    /// Jobs enqueued (immediate and delayed)
    pub static ref QUEUE_ENQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_enqueued_total", METRIC_PREFIX),
        "Total delivery jobs enqueued"
    ).unwrap();

    /// Jobs waiting for their retry delay to elapse
    pub static ref QUEUE_DELAYED: IntGauge = register_int_gauge!(
        format!("{}_queue_delayed", METRIC_PREFIX),
        "Delivery jobs waiting for a retry delay"
    ).unwrap();

    /// Jobs taken by workers
    pub static ref QUEUE_CONSUMED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_consumed_total", METRIC_PREFIX),
        "Total delivery jobs consumed by workers"
    ).unwrap();

    /// Jobs lost because the queue was closed
    pub static ref QUEUE_DROPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_dropped_total", METRIC_PREFIX),
        "Delivery jobs dropped because the queue was closed"
    ).unwrap();

    // ============================================================================
    // Recovery Metrics
    // ============================================================================

    /// Sweep runs by result (completed, skipped, error)
    pub static ref RECOVERY_SWEEPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_recovery_sweeps_total", METRIC_PREFIX),
        "Total recovery sweep runs",
        &["result"]
    ).unwrap();

    /// Stale rows processed by outcome (sent, failed, finalized)
    pub static ref RECOVERY_ROWS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_recovery_rows_total", METRIC_PREFIX),
        "Stale pending rows processed by the recovery sweep",
        &["outcome"]
    ).unwrap();

    /// Sweep duration
    pub static ref RECOVERY_SWEEP_DURATION: Histogram = register_histogram!(
        format!("{}_recovery_sweep_duration_seconds", METRIC_PREFIX),
        "Recovery sweep duration in seconds",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();

    // ============================================================================
    // State Gauges (refreshed on scrape)
    // ============================================================================

    /// Delivery log rows by status
    pub static ref DELIVERY_LOG_ROWS: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_delivery_log_rows", METRIC_PREFIX),
        "Delivery log rows by status",
        &["status"]
    ).unwrap();

    /// Registered delivery channels
    pub static ref CHANNELS_REGISTERED: IntGauge = register_int_gauge!(
        format!("{}_channels_registered", METRIC_PREFIX),
        "Number of registered delivery channels"
    ).unwrap();

    /// Users known to the directory
    pub static ref USERS_KNOWN: IntGauge = register_int_gauge!(
        format!("{}_users_known", METRIC_PREFIX),
        "Number of users in the user directory"
    ).unwrap();

    // ============================================================================
    // Backend Metrics
    // ============================================================================

    /// Storage backend operation latency
    pub static ref BACKEND_OPERATION_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_backend_operation_latency_seconds", METRIC_PREFIX),
        "Backend operation latency in seconds",
        &["backend", "operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    ).unwrap();

    /// Storage backend errors
    pub static ref BACKEND_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_backend_errors_total", METRIC_PREFIX),
        "Total backend operation errors",
        &["backend", "operation"]
    ).unwrap();
}
