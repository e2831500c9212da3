//! In-process job queue built on a tokio mpsc channel.
//!
//! Jobs are lost on service restart; their log rows stay `pending` and are
//! finalized by the recovery sweep.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};

use crate::metrics::QueueMetrics;

use super::backend::{JobQueue, QueueError};
use super::job::DeliveryJob;

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    delayed: AtomicU64,
    consumed: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub name: String,
    pub enqueued: u64,
    /// Jobs currently waiting for their delay to elapse.
    pub delayed: u64,
    pub consumed: u64,
    pub dropped: u64,
}

/// Consumer side of a [`MemoryJobQueue`]. Clones share one channel, so each
/// job is handed to exactly one worker.
#[derive(Clone)]
pub struct JobReceiver {
    inner: Arc<Mutex<mpsc::Receiver<DeliveryJob>>>,
    counters: Arc<Counters>,
}

impl JobReceiver {
    /// Wait for the next job. `None` once every sender is gone.
    pub async fn recv(&self) -> Option<DeliveryJob> {
        let job = self.inner.lock().await.recv().await;
        if job.is_some() {
            self.counters.consumed.fetch_add(1, Ordering::Relaxed);
            QueueMetrics::record_consumed();
        }
        job
    }

    /// Non-blocking receive, used by tests to drain the queue.
    pub fn try_recv(&self) -> Option<DeliveryJob> {
        let mut guard = self.inner.try_lock().ok()?;
        let job = guard.try_recv().ok();
        if job.is_some() {
            self.counters.consumed.fetch_add(1, Ordering::Relaxed);
            QueueMetrics::record_consumed();
        }
        job
    }
}

pub struct MemoryJobQueue {
    name: String,
    sender: mpsc::Sender<DeliveryJob>,
    receiver: JobReceiver,
    counters: Arc<Counters>,
}

impl MemoryJobQueue {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(Counters::default());
        Self {
            name: name.into(),
            sender,
            receiver: JobReceiver {
                inner: Arc::new(Mutex::new(receiver)),
                counters: counters.clone(),
            },
            counters,
        }
    }

    pub fn receiver(&self) -> JobReceiver {
        self.receiver.clone()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            name: self.name.clone(),
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            delayed: self.counters.delayed.load(Ordering::Relaxed),
            consumed: self.counters.consumed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, job: DeliveryJob, delay: Duration) -> Result<(), QueueError> {
        if self.sender.is_closed() {
            return Err(QueueError::Closed(self.name.clone()));
        }

        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        QueueMetrics::record_enqueued();

        if delay.is_zero() {
            return self
                .sender
                .send(job)
                .await
                .map_err(|_| QueueError::Closed(self.name.clone()));
        }

        tracing::debug!(
            queue = %self.name,
            job_id = %job.id,
            log_id = %job.log_id,
            attempt = job.attempt,
            delay_secs = delay.as_secs(),
            "Delaying delivery job"
        );

        let sender = self.sender.clone();
        let counters = self.counters.clone();
        let queue = self.name.clone();
        counters.delayed.fetch_add(1, Ordering::Relaxed);
        QueueMetrics::record_delay_started();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            counters.delayed.fetch_sub(1, Ordering::Relaxed);
            QueueMetrics::record_delay_finished();

            let log_id = job.log_id;
            if sender.send(job).await.is_err() {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                QueueMetrics::record_dropped();
                tracing::warn!(
                    queue = %queue,
                    log_id = %log_id,
                    "Queue closed before delayed job became visible"
                );
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NotificationPayload;
    use uuid::Uuid;

    fn job() -> DeliveryJob {
        DeliveryJob::new(
            Uuid::new_v4(),
            "u-1",
            "email",
            NotificationPayload::PasswordChanged {
                user_id: "u-1".to_string(),
                user_name: "Ada".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_immediate_enqueue_is_visible() {
        let queue = MemoryJobQueue::new("notifications", 16);
        let receiver = queue.receiver();
        let j = job();

        queue.enqueue(j.clone(), Duration::ZERO).await.unwrap();
        assert_eq!(receiver.recv().await, Some(j));

        let stats = queue.stats();
        assert_eq!(stats.enqueued, 1);
        assert_eq!(stats.consumed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_enqueue_waits() {
        let queue = MemoryJobQueue::new("notifications", 16);
        let receiver = queue.receiver();

        queue.enqueue(job(), Duration::from_secs(30)).await.unwrap();
        tokio::task::yield_now().await;
        assert!(receiver.try_recv().is_none());
        assert_eq!(queue.stats().delayed, 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(receiver.recv().await.is_some());
        assert_eq!(queue.stats().delayed, 0);
    }

    #[tokio::test]
    async fn test_each_job_goes_to_one_receiver() {
        let queue = MemoryJobQueue::new("notifications", 16);
        let a = queue.receiver();
        let b = queue.receiver();

        queue.enqueue(job(), Duration::ZERO).await.unwrap();
        assert!(a.try_recv().is_some());
        assert!(b.try_recv().is_none());
    }
}
