//! Job queue abstraction.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::job::DeliveryJob;

#[derive(Debug, Clone, Error)]
pub enum QueueError {
    #[error("Queue {0} is closed")]
    Closed(String),
}

/// A named queue that accepts delivery jobs, optionally after a delay.
///
/// Enqueueing only guarantees the job was accepted. A job accepted with a
/// delay that is lost before it becomes visible (e.g. process exit) leaves
/// its log row pending, and the recovery sweep picks it up.
#[async_trait]
pub trait JobQueue: Send + Sync {
    fn name(&self) -> &str;

    async fn enqueue(&self, job: DeliveryJob, delay: Duration) -> Result<(), QueueError>;
}
