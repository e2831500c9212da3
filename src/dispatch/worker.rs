use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::queue::JobReceiver;

use super::executor::{DeliveryExecutor, JobOutcome};

#[derive(Debug, Default)]
struct WorkerCounters {
    processed: AtomicU64,
    sent: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
    already_finalized: AtomicU64,
    abandoned: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerPoolStats {
    pub workers: usize,
    pub processed: u64,
    pub sent: u64,
    pub retried: u64,
    pub failed: u64,
    pub already_finalized: u64,
    pub abandoned: u64,
}

/// A fixed set of workers sharing one job receiver.
pub struct DeliveryWorkerPool {
    executor: Arc<DeliveryExecutor>,
    receiver: JobReceiver,
    workers: usize,
    counters: Arc<WorkerCounters>,
}

impl DeliveryWorkerPool {
    pub fn new(executor: Arc<DeliveryExecutor>, receiver: JobReceiver, workers: usize) -> Self {
        Self {
            executor,
            receiver,
            workers: workers.max(1),
            counters: Arc::new(WorkerCounters::default()),
        }
    }

    pub fn stats(&self) -> WorkerPoolStats {
        WorkerPoolStats {
            workers: self.workers,
            processed: self.counters.processed.load(Ordering::Relaxed),
            sent: self.counters.sent.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            already_finalized: self.counters.already_finalized.load(Ordering::Relaxed),
            abandoned: self.counters.abandoned.load(Ordering::Relaxed),
        }
    }

    /// Spawn the workers. Each stops when `shutdown` fires or the queue closes.
    pub fn spawn(&self, shutdown: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        tracing::info!(workers = self.workers, "Starting delivery workers");

        (0..self.workers)
            .map(|worker_id| {
                let executor = self.executor.clone();
                let receiver = self.receiver.clone();
                let counters = self.counters.clone();
                let shutdown = shutdown.subscribe();
                tokio::spawn(run_worker(worker_id, executor, receiver, counters, shutdown))
            })
            .collect()
    }
}

async fn run_worker(
    worker_id: usize,
    executor: Arc<DeliveryExecutor>,
    receiver: JobReceiver,
    counters: Arc<WorkerCounters>,
    mut shutdown: broadcast::Receiver<()>,
) {
    tracing::debug!(worker_id, "Delivery worker started");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::debug!(worker_id, "Delivery worker received shutdown signal");
                break;
            }
            job = receiver.recv() => {
                let Some(job) = job else {
                    tracing::info!(worker_id, "Job queue closed, delivery worker exiting");
                    break;
                };

                let outcome = executor.execute(job).await;
                counters.processed.fetch_add(1, Ordering::Relaxed);
                let counter = match outcome {
                    JobOutcome::Sent => &counters.sent,
                    JobOutcome::Retrying { .. } => &counters.retried,
                    JobOutcome::Failed { .. } => &counters.failed,
                    JobOutcome::AlreadyFinalized => &counters.already_finalized,
                    JobOutcome::Abandoned { .. } => &counters.abandoned,
                };
                counter.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    tracing::debug!(worker_id, "Delivery worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::channel::{ChannelError, ChannelRegistry, NotificationChannel};
    use crate::delivery_log::{
        DeliveryLogBackend, DeliveryLogEntry, DeliveryStatus, MemoryDeliveryLogBackend,
    };
    use crate::directory::{MemoryUserDirectory, UserDirectory};
    use crate::dispatch::RetryPolicy;
    use crate::notification::{NotificationPayload, User};
    use crate::queue::{DeliveryJob, JobQueue, MemoryJobQueue};

    struct OkChannel;

    #[async_trait]
    impl NotificationChannel for OkChannel {
        fn id(&self) -> &str {
            "database"
        }

        async fn send(&self, _user: &User, _payload: &NotificationPayload) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_workers_drain_queue_and_stop() {
        let registry = Arc::new(ChannelRegistry::new());
        registry.register("database", Arc::new(OkChannel));
        let users = Arc::new(MemoryUserDirectory::new());
        users
            .upsert(User::new("u-1", "Ada", "ada@example.com"))
            .await
            .unwrap();
        let logs = Arc::new(MemoryDeliveryLogBackend::new());
        let queue = Arc::new(MemoryJobQueue::new("notifications", 64));

        let executor = Arc::new(DeliveryExecutor::new(
            registry,
            users,
            logs.clone(),
            queue.clone(),
            RetryPolicy::default(),
        ));
        let pool = DeliveryWorkerPool::new(executor, queue.receiver(), 3);
        let (shutdown_tx, _) = broadcast::channel(1);
        let handles = pool.spawn(&shutdown_tx);

        let payload = NotificationPayload::UserRegistered {
            user_id: "u-1".to_string(),
            user_name: "Ada".to_string(),
        };
        for _ in 0..10 {
            let entry = DeliveryLogEntry::pending("u-1", "database", &payload).unwrap();
            let job = DeliveryJob::new(entry.id, "u-1", "database", payload.clone());
            logs.create_pending(entry).await.unwrap();
            queue.enqueue(job, Duration::ZERO).await.unwrap();
        }

        for _ in 0..100 {
            if pool.stats().processed == 10 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(pool.stats().sent, 10);
        assert!(logs.all().iter().all(|e| e.status == DeliveryStatus::Sent));

        shutdown_tx.send(()).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
