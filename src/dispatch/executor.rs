use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;

use crate::channel::ChannelRegistry;
use crate::delivery_log::DeliveryLogBackend;
use crate::directory::UserDirectory;
use crate::metrics::DeliveryMetrics;
use crate::notification::NotifyError;
use crate::queue::{DeliveryJob, JobQueue};

/// Retry budget for a delivery job. Retries use a fixed backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Longest time a row can legitimately stay pending through retries.
    pub fn retry_window(&self) -> Duration {
        self.backoff * self.max_attempts
    }
}

/// Result of executing one delivery job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Sent,
    /// Send failed and the job was re-enqueued.
    Retrying { next_attempt: u32, delay_secs: u64 },
    /// Row finalized as failed.
    Failed { reason: String },
    /// The row was no longer pending when this attempt tried to finalize it.
    AlreadyFinalized,
    /// Storage or queue trouble; the row stays pending for the recovery sweep.
    Abandoned { reason: String },
}

/// Executes delivery jobs: one channel send per attempt, then a log
/// transition or a delayed re-enqueue.
pub struct DeliveryExecutor {
    registry: Arc<ChannelRegistry>,
    users: Arc<dyn UserDirectory>,
    logs: Arc<dyn DeliveryLogBackend>,
    queue: Arc<dyn JobQueue>,
    policy: RetryPolicy,
}

impl DeliveryExecutor {
    pub fn new(
        registry: Arc<ChannelRegistry>,
        users: Arc<dyn UserDirectory>,
        logs: Arc<dyn DeliveryLogBackend>,
        queue: Arc<dyn JobQueue>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            users,
            logs,
            queue,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    #[tracing::instrument(
        name = "executor.execute",
        skip(self, job),
        fields(
            log_id = %job.log_id,
            channel = %job.channel_id,
            user_id = %job.user_id,
            attempt = job.attempt
        )
    )]
    pub async fn execute(&self, job: DeliveryJob) -> JobOutcome {
        let channel = match self.registry.get(&job.channel_id) {
            Ok(channel) => channel,
            Err(e) => return self.finalize_failed(&job, &e.to_string()).await,
        };

        let user = match self.users.find_by_id(&job.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return self.finalize_failed(&job, "User not found").await,
            Err(e) => {
                tracing::warn!(
                    log_id = %job.log_id,
                    error = %e,
                    "User lookup failed, row left pending for recovery"
                );
                return JobOutcome::Abandoned {
                    reason: e.to_string(),
                };
            }
        };

        let started = Instant::now();
        match channel.send(&user, &job.payload).await {
            Ok(()) => {
                let latency = started.elapsed().as_secs_f64();
                match self.logs.mark_sent(job.log_id, Utc::now()).await {
                    Ok(true) => {
                        DeliveryMetrics::record_sent(&job.channel_id, latency);
                        tracing::info!(
                            log_id = %job.log_id,
                            channel = %job.channel_id,
                            attempt = job.attempt,
                            "Notification delivered"
                        );
                        JobOutcome::Sent
                    }
                    Ok(false) => self.already_finalized(&job),
                    Err(e) => {
                        tracing::error!(
                            log_id = %job.log_id,
                            error = %e,
                            "Delivered but failed to mark log row sent"
                        );
                        JobOutcome::Abandoned {
                            reason: e.to_string(),
                        }
                    }
                }
            }
            Err(e) => {
                let failure = NotifyError::TransientDelivery {
                    channel: job.channel_id.clone(),
                    attempt: job.attempt,
                    message: e.to_string(),
                };
                tracing::warn!(
                    log_id = %job.log_id,
                    error = %failure,
                    "Channel send failed"
                );

                if job.attempt < self.policy.max_attempts {
                    self.retry(&job).await
                } else {
                    self.on_retries_exhausted(&job, &e.to_string()).await
                }
            }
        }
    }

    /// Final hook once every attempt failed: the row becomes `failed` with the
    /// last error message.
    pub async fn on_retries_exhausted(&self, job: &DeliveryJob, last_error: &str) -> JobOutcome {
        let terminal = NotifyError::TerminalDelivery {
            channel: job.channel_id.clone(),
            message: last_error.to_string(),
        };
        tracing::error!(
            log_id = %job.log_id,
            attempts = job.attempt,
            error = %terminal,
            "Retries exhausted"
        );
        self.finalize_failed(job, last_error).await
    }

    async fn retry(&self, job: &DeliveryJob) -> JobOutcome {
        let next = job.next_attempt();
        let next_attempt = next.attempt;
        let delay = self.policy.backoff;

        match self.queue.enqueue(next, delay).await {
            Ok(()) => {
                DeliveryMetrics::record_retry(&job.channel_id);
                tracing::info!(
                    log_id = %job.log_id,
                    next_attempt = next_attempt,
                    delay_secs = delay.as_secs(),
                    "Delivery scheduled for retry"
                );
                JobOutcome::Retrying {
                    next_attempt,
                    delay_secs: delay.as_secs(),
                }
            }
            Err(e) => {
                tracing::warn!(
                    log_id = %job.log_id,
                    error = %e,
                    "Failed to re-enqueue delivery job, row left pending for recovery"
                );
                JobOutcome::Abandoned {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn finalize_failed(&self, job: &DeliveryJob, reason: &str) -> JobOutcome {
        match self.logs.mark_failed(job.log_id, reason).await {
            Ok(true) => {
                DeliveryMetrics::record_failed(&job.channel_id);
                tracing::warn!(
                    log_id = %job.log_id,
                    channel = %job.channel_id,
                    reason = %reason,
                    "Delivery failed"
                );
                JobOutcome::Failed {
                    reason: reason.to_string(),
                }
            }
            Ok(false) => self.already_finalized(job),
            Err(e) => {
                tracing::error!(
                    log_id = %job.log_id,
                    error = %e,
                    "Failed to mark log row failed"
                );
                JobOutcome::Abandoned {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn already_finalized(&self, job: &DeliveryJob) -> JobOutcome {
        DeliveryMetrics::record_already_finalized(&job.channel_id);
        tracing::debug!(
            log_id = %job.log_id,
            channel = %job.channel_id,
            "Log row already finalized"
        );
        JobOutcome::AlreadyFinalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::channel::{ChannelError, NotificationChannel};
    use crate::delivery_log::{DeliveryLogEntry, DeliveryStatus, MemoryDeliveryLogBackend};
    use crate::directory::MemoryUserDirectory;
    use crate::notification::{NotificationPayload, User};

    /// Fails the first `failures` sends, then succeeds.
    struct ScriptedChannel {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl NotificationChannel for ScriptedChannel {
        fn id(&self) -> &str {
            "email"
        }

        async fn send(&self, _user: &User, _payload: &NotificationPayload) -> Result<(), ChannelError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(ChannelError::Transport(format!("smtp timeout #{}", call)))
            } else {
                Ok(())
            }
        }
    }

    /// Captures enqueued jobs instead of delivering them.
    #[derive(Default)]
    struct RecordingQueue {
        jobs: Mutex<Vec<(DeliveryJob, Duration)>>,
    }

    impl RecordingQueue {
        fn pop(&self) -> Option<(DeliveryJob, Duration)> {
            self.jobs.lock().unwrap().pop()
        }
    }

    #[async_trait]
    impl JobQueue for RecordingQueue {
        fn name(&self) -> &str {
            "notifications"
        }

        async fn enqueue(
            &self,
            job: DeliveryJob,
            delay: Duration,
        ) -> Result<(), crate::queue::QueueError> {
            self.jobs.lock().unwrap().push((job, delay));
            Ok(())
        }
    }

    struct Fixture {
        executor: DeliveryExecutor,
        logs: Arc<MemoryDeliveryLogBackend>,
        queue: Arc<RecordingQueue>,
        first_job: DeliveryJob,
    }

    async fn fixture(failures: u32) -> Fixture {
        let registry = Arc::new(ChannelRegistry::new());
        registry.register(
            "email",
            Arc::new(ScriptedChannel {
                failures,
                calls: AtomicU32::new(0),
            }),
        );
        let users = Arc::new(MemoryUserDirectory::new());
        users
            .upsert(User::new("u-1", "Ada", "ada@example.com"))
            .await
            .unwrap();
        let logs = Arc::new(MemoryDeliveryLogBackend::new());
        let queue = Arc::new(RecordingQueue::default());

        let payload = NotificationPayload::PasswordChanged {
            user_id: "u-1".to_string(),
            user_name: "Ada".to_string(),
        };
        let entry = DeliveryLogEntry::pending("u-1", "email", &payload).unwrap();
        let first_job = DeliveryJob::new(entry.id, "u-1", "email", payload);
        logs.create_pending(entry).await.unwrap();

        let executor = DeliveryExecutor::new(
            registry,
            users,
            logs.clone(),
            queue.clone(),
            RetryPolicy::default(),
        );
        Fixture {
            executor,
            logs,
            queue,
            first_job,
        }
    }

    #[tokio::test]
    async fn test_fail_fail_succeed_is_sent_once() {
        let f = fixture(2).await;
        let log_id = f.first_job.log_id;

        let outcome = f.executor.execute(f.first_job.clone()).await;
        assert_eq!(
            outcome,
            JobOutcome::Retrying {
                next_attempt: 2,
                delay_secs: 30
            }
        );
        let status = f.logs.get(log_id).await.unwrap().unwrap().status;
        assert_eq!(status, DeliveryStatus::Pending);

        let (second, delay) = f.queue.pop().unwrap();
        assert_eq!(delay, Duration::from_secs(30));
        assert!(matches!(
            f.executor.execute(second).await,
            JobOutcome::Retrying { next_attempt: 3, .. }
        ));
        assert_eq!(
            f.logs.get(log_id).await.unwrap().unwrap().status,
            DeliveryStatus::Pending
        );

        let (third, _) = f.queue.pop().unwrap();
        assert_eq!(f.executor.execute(third).await, JobOutcome::Sent);

        let row = f.logs.get(log_id).await.unwrap().unwrap();
        assert_eq!(row.status, DeliveryStatus::Sent);
        assert!(row.error_message.is_none());
        assert!(f.queue.pop().is_none());
    }

    #[tokio::test]
    async fn test_three_failures_record_last_error() {
        let f = fixture(3).await;
        let log_id = f.first_job.log_id;

        f.executor.execute(f.first_job.clone()).await;
        let (second, _) = f.queue.pop().unwrap();
        f.executor.execute(second).await;
        let (third, _) = f.queue.pop().unwrap();

        let outcome = f.executor.execute(third).await;
        assert_eq!(
            outcome,
            JobOutcome::Failed {
                reason: "transport error: smtp timeout #3".to_string()
            }
        );
        let row = f.logs.get(log_id).await.unwrap().unwrap();
        assert_eq!(row.status, DeliveryStatus::Failed);
        assert_eq!(
            row.error_message.as_deref(),
            Some("transport error: smtp timeout #3")
        );
        assert!(f.queue.pop().is_none());
    }

    #[tokio::test]
    async fn test_unregistered_channel_fails_without_retry() {
        let f = fixture(0).await;
        let mut job = f.first_job.clone();
        job.channel_id = "pager".to_string();

        let outcome = f.executor.execute(job).await;
        assert_eq!(
            outcome,
            JobOutcome::Failed {
                reason: "Notification channel [pager] is not registered.".to_string()
            }
        );
        assert!(f.queue.pop().is_none());
    }

    #[tokio::test]
    async fn test_missing_user_fails_without_retry() {
        let f = fixture(0).await;
        let mut job = f.first_job.clone();
        job.user_id = "ghost".to_string();

        let outcome = f.executor.execute(job).await;
        assert_eq!(
            outcome,
            JobOutcome::Failed {
                reason: "User not found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_late_completion_reports_already_finalized() {
        let f = fixture(0).await;
        f.logs
            .mark_failed(f.first_job.log_id, "recovered elsewhere")
            .await
            .unwrap();

        assert_eq!(
            f.executor.execute(f.first_job.clone()).await,
            JobOutcome::AlreadyFinalized
        );
        let row = f.logs.get(f.first_job.log_id).await.unwrap().unwrap();
        assert_eq!(row.status, DeliveryStatus::Failed);
    }

    #[test]
    fn test_retry_window() {
        assert_eq!(RetryPolicy::default().retry_window(), Duration::from_secs(90));
    }
}
