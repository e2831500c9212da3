//! End-to-end delivery pipeline tests
//!
//! Security event -> dispatcher -> delivery log + job queue -> executor ->
//! channel transports, wired with in-memory backends and recording
//! transports instead of real providers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use security_notification_service::channel::{
    ChannelCatalog, ChannelError, ChannelRegistry, EmailChannel, InAppChannel, MailTransport,
    PushChannel, PushTransport, SmsChannel, SmsTransport, DATABASE_CHANNEL, EMAIL_CHANNEL,
    PUSH_CHANNEL, SMS_CHANNEL,
};
use security_notification_service::delivery_log::{
    DeliveryLogBackend, DeliveryLogEntry, DeliveryStatus, MemoryDeliveryLogBackend,
};
use security_notification_service::directory::{MemoryUserDirectory, UserDirectory};
use security_notification_service::dispatch::{
    DeliveryExecutor, JobOutcome, NotificationDispatcher, RetryPolicy,
};
use security_notification_service::events::{LoginHistory, SecurityEvent, SecurityEventHandler};
use security_notification_service::inbox::{InboxBackend, MemoryInboxBackend};
use security_notification_service::notification::{
    AppInfo, DevicePlatform, EventType, MailMessage, NotificationPayload, PushMessage, User,
};
use security_notification_service::preference::{
    MemoryPreferenceBackend, PreferenceService, PreferenceUpdate,
};
use security_notification_service::queue::{JobReceiver, MemoryJobQueue};
use security_notification_service::tasks::{RecoveryConfig, RecoverySweep, SweepOutcome};

// ============================================================================
// Recording transports
// ============================================================================

/// Mail transport that fails a configurable number of times before
/// recording messages.
#[derive(Default)]
struct RecordingMail {
    failures_left: AtomicU32,
    attempts: AtomicU32,
    sent: Mutex<Vec<(String, MailMessage)>>,
}

impl RecordingMail {
    fn failing(times: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(times),
            ..Default::default()
        }
    }

    fn sent(&self) -> Vec<(String, MailMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for RecordingMail {
    async fn send_mail(&self, to: &str, message: &MailMessage) -> Result<(), ChannelError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ChannelError::Transport(format!("smtp down #{}", attempt)));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), message.clone()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSms {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SmsTransport for RecordingSms {
    async fn send_sms(&self, to: &str, text: &str) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingPush {
    sent: Mutex<Vec<(String, PushMessage)>>,
}

#[async_trait]
impl PushTransport for RecordingPush {
    async fn send_to_device(&self, token: &str, message: &PushMessage) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .unwrap()
            .push((token.to_string(), message.clone()));
        Ok(())
    }
}

// ============================================================================
// Test environment
// ============================================================================

struct TestEnvironment {
    mail: Arc<RecordingMail>,
    sms: Arc<RecordingSms>,
    push: Arc<RecordingPush>,
    inbox: Arc<MemoryInboxBackend>,
    registry: Arc<ChannelRegistry>,
    users: Arc<MemoryUserDirectory>,
    preferences: Arc<PreferenceService>,
    logs: Arc<MemoryDeliveryLogBackend>,
    receiver: JobReceiver,
    dispatcher: Arc<NotificationDispatcher>,
    executor: Arc<DeliveryExecutor>,
    events: Arc<SecurityEventHandler>,
}

fn recording_registry(
    inbox: Arc<MemoryInboxBackend>,
    mail: Arc<RecordingMail>,
    sms: Arc<RecordingSms>,
    push: Arc<RecordingPush>,
) -> Arc<ChannelRegistry> {
    let app = AppInfo::default();
    let registry = Arc::new(ChannelRegistry::new());
    registry.register(DATABASE_CHANNEL, Arc::new(InAppChannel::new(inbox, app.clone())));
    registry.register(EMAIL_CHANNEL, Arc::new(EmailChannel::new(mail, app.clone())));
    registry.register(SMS_CHANNEL, Arc::new(SmsChannel::new(sms, app.clone())));
    registry.register(PUSH_CHANNEL, Arc::new(PushChannel::new(push, app)));
    registry
}

fn create_test_environment(mail: RecordingMail) -> TestEnvironment {
    let mail = Arc::new(mail);
    let sms = Arc::new(RecordingSms::default());
    let push = Arc::new(RecordingPush::default());
    let inbox = Arc::new(MemoryInboxBackend::new());
    let registry = recording_registry(inbox.clone(), mail.clone(), sms.clone(), push.clone());

    let users = Arc::new(MemoryUserDirectory::new());
    let preferences = Arc::new(PreferenceService::new(
        Arc::new(MemoryPreferenceBackend::new()),
        Arc::new(ChannelCatalog::with_builtin(&[])),
    ));
    let logs = Arc::new(MemoryDeliveryLogBackend::new());
    let queue = Arc::new(MemoryJobQueue::new("notifications", 64));
    let receiver = queue.receiver();

    let dispatcher = Arc::new(NotificationDispatcher::new(
        registry.clone(),
        preferences.clone(),
        logs.clone(),
        queue.clone(),
    ));
    let executor = Arc::new(DeliveryExecutor::new(
        registry.clone(),
        users.clone(),
        logs.clone(),
        queue,
        RetryPolicy::default(),
    ));
    let events = Arc::new(SecurityEventHandler::new(
        users.clone(),
        preferences.clone(),
        dispatcher.clone(),
        Arc::new(LoginHistory::new()),
    ));

    TestEnvironment {
        mail,
        sms,
        push,
        inbox,
        registry,
        users,
        preferences,
        logs,
        receiver,
        dispatcher,
        executor,
        events,
    }
}

fn alice() -> User {
    User::new("user-1", "Alice", "alice@example.com")
        .with_phone("+15550100")
        .with_device("device-token-1", DevicePlatform::Android)
}

impl TestEnvironment {
    /// Execute queued jobs, including delayed retries, until the queue stays
    /// empty longer than any backoff.
    async fn drain(&self) -> Vec<(String, JobOutcome)> {
        let mut outcomes = Vec::new();
        while let Ok(Some(job)) =
            tokio::time::timeout(Duration::from_secs(300), self.receiver.recv()).await
        {
            let channel = job.channel_id.clone();
            outcomes.push((channel, self.executor.execute(job).await));
        }
        outcomes
    }

    fn row_for(&self, channel: &str) -> DeliveryLogEntry {
        self.logs
            .all()
            .into_iter()
            .find(|e| e.channel_id == channel)
            .expect("row for channel")
    }
}

// ============================================================================
// Registration flow
// ============================================================================

mod registration_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_registration_delivers_welcome_on_every_channel() {
        let env = create_test_environment(RecordingMail::default());
        env.users.upsert(alice()).await.unwrap();

        let report = env
            .events
            .handle(SecurityEvent::UserRegistered {
                user_id: "user-1".to_string(),
            })
            .await
            .unwrap();

        // 4 channels x 3 event types
        let prefs = env.preferences.list("user-1").await.unwrap();
        assert_eq!(prefs.len(), 12);
        assert!(prefs.iter().all(|p| p.enabled));

        assert_eq!(report.queued.len(), 4);
        assert_eq!(env.logs.len(), 4);
        assert!(env
            .logs
            .all()
            .iter()
            .all(|e| e.status == DeliveryStatus::Pending && e.event_type == EventType::UserRegistered));

        let outcomes = env.drain().await;
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(|(_, o)| *o == JobOutcome::Sent));
        assert!(env.logs.all().iter().all(|e| e.status == DeliveryStatus::Sent));

        let mail = env.mail.sent();
        assert_eq!(mail.len(), 1);
        assert_eq!(mail[0].0, "alice@example.com");
        assert!(mail[0].1.subject.contains("Welcome"));

        let sms = env.sms.sent.lock().unwrap().clone();
        assert_eq!(sms, vec![(
            "+15550100".to_string(),
            "Welcome to Ara, Alice! Your account is ready.".to_string()
        )]);

        let push = env.push.sent.lock().unwrap().clone();
        assert_eq!(push.len(), 1);
        assert_eq!(push[0].0, "device-token-1");
        assert!(push[0].1.title.contains("Welcome"));

        let inbox = env.inbox.list("user-1", false, 15, 0).await.unwrap();
        assert_eq!(inbox.total, 1);
        assert_eq!(inbox.items[0].data.title, "Welcome!");
    }

    #[tokio::test]
    async fn test_repeated_registration_keeps_twelve_preferences() {
        let env = create_test_environment(RecordingMail::default());
        env.users.upsert(alice()).await.unwrap();

        for _ in 0..2 {
            tokio_test::assert_ok!(
                env.events
                    .handle(SecurityEvent::UserRegistered {
                        user_id: "user-1".to_string(),
                    })
                    .await
            );
        }

        assert_eq!(env.preferences.list("user-1").await.unwrap().len(), 12);
        // Each dispatch creates its own rows
        assert_eq!(env.logs.len(), 8);
    }

    #[tokio::test]
    async fn test_unknown_user_creates_nothing() {
        let env = create_test_environment(RecordingMail::default());

        let result = env
            .events
            .handle(SecurityEvent::PasswordChanged {
                user_id: "ghost".to_string(),
            })
            .await;

        assert!(result.is_err());
        assert!(env.logs.is_empty());
    }
}

// ============================================================================
// Retry semantics
// ============================================================================

mod retry_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_two_failures_then_success_is_sent_once() {
        let env = create_test_environment(RecordingMail::failing(2));
        env.users.upsert(alice()).await.unwrap();

        env.events
            .handle(SecurityEvent::PasswordChanged {
                user_id: "user-1".to_string(),
            })
            .await
            .unwrap();

        let outcomes = env.drain().await;
        let email: Vec<_> = outcomes
            .iter()
            .filter(|(c, _)| c == EMAIL_CHANNEL)
            .map(|(_, o)| o.clone())
            .collect();
        assert_eq!(
            email,
            vec![
                JobOutcome::Retrying {
                    next_attempt: 2,
                    delay_secs: 30
                },
                JobOutcome::Retrying {
                    next_attempt: 3,
                    delay_secs: 30
                },
                JobOutcome::Sent,
            ]
        );

        let row = env.row_for(EMAIL_CHANNEL);
        assert_eq!(row.status, DeliveryStatus::Sent);
        assert!(row.error_message.is_none());
        assert!(row.sent_at.is_some());
        assert_eq!(env.mail.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_failures_record_last_error() {
        let env = create_test_environment(RecordingMail::failing(u32::MAX));
        env.users.upsert(alice()).await.unwrap();

        env.events
            .handle(SecurityEvent::PasswordChanged {
                user_id: "user-1".to_string(),
            })
            .await
            .unwrap();

        env.drain().await;

        let row = env.row_for(EMAIL_CHANNEL);
        assert_eq!(row.status, DeliveryStatus::Failed);
        assert_eq!(
            row.error_message.as_deref(),
            Some("transport error: smtp down #3")
        );
        assert_eq!(env.mail.attempts.load(Ordering::SeqCst), 3);

        // Other channels are unaffected by the email failure
        assert_eq!(env.row_for(SMS_CHANNEL).status, DeliveryStatus::Sent);
        assert_eq!(env.row_for(DATABASE_CHANNEL).status, DeliveryStatus::Sent);
    }
}

// ============================================================================
// Preferences
// ============================================================================

mod preference_tests {
    use super::*;

    #[tokio::test]
    async fn test_opt_out_is_scoped_to_user_and_event_type() {
        let env = create_test_environment(RecordingMail::default());
        env.users.upsert(alice()).await.unwrap();
        env.users
            .upsert(User::new("user-2", "Bob", "bob@example.com"))
            .await
            .unwrap();

        let result = env
            .preferences
            .bulk_update(
                "user-1",
                vec![PreferenceUpdate {
                    channel_slug: EMAIL_CHANNEL.to_string(),
                    event_type: EventType::PasswordChanged,
                    is_enabled: false,
                }],
            )
            .await;
        assert_eq!(result.applied.len(), 1);

        let alice_pw = env
            .events
            .handle(SecurityEvent::PasswordChanged {
                user_id: "user-1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(alice_pw.queued.len(), 3);
        assert_eq!(alice_pw.skipped, vec![EMAIL_CHANNEL.to_string()]);

        let bob_pw = env
            .events
            .handle(SecurityEvent::PasswordChanged {
                user_id: "user-2".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(bob_pw.queued.len(), 4);

        let alice_login = env
            .events
            .handle(SecurityEvent::LoginFromNewIp {
                user_id: "user-1".to_string(),
                ip_address: "203.0.113.9".to_string(),
                user_agent: None,
            })
            .await
            .unwrap();
        assert_eq!(alice_login.queued.len(), 4);
    }

    #[tokio::test]
    async fn test_dispatch_creates_one_job_per_row() {
        let env = create_test_environment(RecordingMail::default());
        env.users.upsert(alice()).await.unwrap();

        let report = env
            .events
            .handle(SecurityEvent::PasswordChanged {
                user_id: "user-1".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(report.rows_created(), env.registry.len());
        assert_eq!(env.logs.len(), env.registry.len());

        let mut jobs = Vec::new();
        while let Some(job) = env.receiver.try_recv() {
            jobs.push(job);
        }
        assert_eq!(jobs.len(), env.logs.len());
        for row in env.logs.all() {
            assert_eq!(jobs.iter().filter(|j| j.log_id == row.id).count(), 1);
        }
        assert_eq!(env.dispatcher.stats().total_queued, 4);
    }
}

// ============================================================================
// Logins and recovery
// ============================================================================

mod login_and_recovery_tests {
    use super::*;

    #[tokio::test]
    async fn test_only_new_addresses_notify() {
        let env = create_test_environment(RecordingMail::default());
        env.users.upsert(alice()).await.unwrap();

        let first = env
            .events
            .record_login("user-1", "198.51.100.1", Some("Firefox"))
            .await
            .unwrap();
        assert!(first.login.is_new_ip);
        assert!(first.dispatch.is_some());

        let repeat = env
            .events
            .record_login("user-1", "198.51.100.1", Some("Firefox"))
            .await
            .unwrap();
        assert!(!repeat.login.is_new_ip);
        assert!(repeat.dispatch.is_none());

        let other = env
            .events
            .record_login("user-1", "198.51.100.2", None)
            .await
            .unwrap();
        assert!(other.dispatch.is_some());
        assert_eq!(env.logs.len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_finalizes_stranded_rows_and_late_jobs_yield() {
        let env = create_test_environment(RecordingMail::default());
        env.users.upsert(alice()).await.unwrap();

        env.events
            .record_login("user-1", "198.51.100.7", Some("curl/8.0"))
            .await
            .unwrap();

        // Jobs are still queued; the sweep gets to the rows first.
        let sweep = RecoverySweep::new(
            env.registry.clone(),
            env.users.clone(),
            env.logs.clone(),
            RecoveryConfig {
                stale_after: Duration::ZERO,
                ..RecoveryConfig::default()
            },
        );

        let report = match sweep.run_once().await.unwrap() {
            SweepOutcome::Completed(report) => report,
            SweepOutcome::Skipped => panic!("sweep should not be skipped"),
        };
        assert_eq!(report.examined, 4);
        assert_eq!(report.sent, 4);

        // The recovered mail keeps the login context
        let mail = env.mail.sent();
        assert!(mail[0].1.text_body().contains("198.51.100.7"));

        let outcomes = env.drain().await;
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes
            .iter()
            .all(|(_, o)| *o == JobOutcome::AlreadyFinalized));
        assert!(env.logs.all().iter().all(|e| e.status == DeliveryStatus::Sent));

        // Nothing left for a second sweep
        match sweep.run_once().await.unwrap() {
            SweepOutcome::Completed(report) => assert_eq!(report.examined, 0),
            SweepOutcome::Skipped => panic!("sweep should not be skipped"),
        }
    }
    #[tokio::test]
    async fn test_sweep_after_restart_resolves_users_from_directory() {
        // Rows and users outlive the process; channels and the sweep do not.
        let directory = Arc::new(MemoryUserDirectory::new());
        let logs = Arc::new(MemoryDeliveryLogBackend::new());
        directory.upsert(alice()).await.unwrap();

        let payload = NotificationPayload::PasswordChanged {
            user_id: "user-1".to_string(),
            user_name: "Alice".to_string(),
        };
        let mut entry = DeliveryLogEntry::pending("user-1", EMAIL_CHANNEL, &payload).unwrap();
        entry.created_at = chrono::Utc::now() - chrono::Duration::minutes(10);
        let id = entry.id;
        logs.create_pending(entry).await.unwrap();

        // Fresh process: new channels and sweep over the same stores.
        let mail = Arc::new(RecordingMail::default());
        let registry = recording_registry(
            Arc::new(MemoryInboxBackend::new()),
            mail.clone(),
            Arc::new(RecordingSms::default()),
            Arc::new(RecordingPush::default()),
        );
        let users: Arc<dyn UserDirectory> = directory.clone();
        let sweep = RecoverySweep::new(registry, users, logs.clone(), RecoveryConfig::default());

        match sweep.run_once().await.unwrap() {
            SweepOutcome::Completed(report) => {
                assert_eq!(report.examined, 1);
                assert_eq!(report.sent, 1);
                assert_eq!(report.failed, 0);
            }
            SweepOutcome::Skipped => panic!("sweep should not be skipped"),
        }
        assert_eq!(logs.get(id).await.unwrap().unwrap().status, DeliveryStatus::Sent);
        assert_eq!(mail.sent()[0].0, "alice@example.com");
    }
}
