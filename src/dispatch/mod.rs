//! Dispatch and delivery.
//!
//! - [`NotificationDispatcher`] fans a payload out to channels: one pending
//!   log row, then one queued job, per enabled channel.
//! - [`DeliveryExecutor`] runs a job: send, then finalize or re-enqueue.
//! - [`DeliveryWorkerPool`] drives the executor from the job queue.

mod executor;
mod orchestrator;
mod worker;

pub use executor::{DeliveryExecutor, JobOutcome, RetryPolicy};
pub use orchestrator::{
    DispatchReport, DispatcherStats, DispatcherStatsSnapshot, NotificationDispatcher,
    QueuedDelivery,
};
pub use worker::{DeliveryWorkerPool, WorkerPoolStats};
