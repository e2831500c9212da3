use std::sync::Arc;

use async_trait::async_trait;

use crate::notification::{AppInfo, NotificationPayload, PushMessage, User};

use super::{ChannelError, NotificationChannel, PUSH_CHANNEL};

/// Push provider (FCM or similar), addressed by device token.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send_to_device(&self, token: &str, message: &PushMessage) -> Result<(), ChannelError>;
}

/// Simulated push provider that logs each message.
#[derive(Debug, Default)]
pub struct LogPushTransport;

#[async_trait]
impl PushTransport for LogPushTransport {
    async fn send_to_device(&self, token: &str, message: &PushMessage) -> Result<(), ChannelError> {
        tracing::info!(
            token = %token,
            title = %message.title,
            body = %message.body,
            "Push notification sent (simulated)"
        );
        Ok(())
    }
}

pub struct PushChannel {
    transport: Arc<dyn PushTransport>,
    app: AppInfo,
}

impl PushChannel {
    pub fn new(transport: Arc<dyn PushTransport>, app: AppInfo) -> Self {
        Self { transport, app }
    }
}

#[async_trait]
impl NotificationChannel for PushChannel {
    fn id(&self) -> &str {
        PUSH_CHANNEL
    }

    /// Sends to every active device token. The whole send fails if any token
    /// failed, so a retry re-sends to all devices.
    async fn send(&self, user: &User, payload: &NotificationPayload) -> Result<(), ChannelError> {
        let Some(message) = payload.render(&self.app).push else {
            tracing::debug!(user_id = %user.id, payload = payload.kind(), "No push representation, skipping");
            return Ok(());
        };

        let mut attempted = 0;
        let mut last_error = None;
        let mut failed = 0;
        for token in user.active_device_tokens() {
            attempted += 1;
            if let Err(e) = self.transport.send_to_device(token, &message).await {
                tracing::warn!(user_id = %user.id, error = %e, "Push to device failed");
                failed += 1;
                last_error = Some(e);
            }
        }

        if attempted == 0 {
            tracing::debug!(user_id = %user.id, "User has no active device tokens, skipping push");
        }

        match last_error {
            Some(e) => Err(ChannelError::Transport(format!(
                "{} of {} devices failed, last error: {}",
                failed, attempted, e
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::DevicePlatform;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FlakyPush {
        reject: Option<&'static str>,
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PushTransport for FlakyPush {
        async fn send_to_device(&self, token: &str, _: &PushMessage) -> Result<(), ChannelError> {
            if self.reject == Some(token) {
                return Err(ChannelError::Rejected(format!("token {} unregistered", token)));
            }
            self.delivered.lock().unwrap().push(token.to_string());
            Ok(())
        }
    }

    fn payload() -> NotificationPayload {
        NotificationPayload::PasswordChanged {
            user_id: "u-1".to_string(),
            user_name: "Ada".to_string(),
        }
    }

    #[tokio::test]
    async fn test_pushes_to_active_tokens_only() {
        let transport = Arc::new(FlakyPush::default());
        let channel = PushChannel::new(transport.clone(), AppInfo::default());
        let mut user = User::new("u-1", "Ada", "ada@example.com")
            .with_device("a", DevicePlatform::Android)
            .with_device("b", DevicePlatform::Web);
        user.device_tokens[1].is_active = false;

        channel.send(&user, &payload()).await.unwrap();
        assert_eq!(*transport.delivered.lock().unwrap(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_partial_failure_is_error() {
        let transport = Arc::new(FlakyPush {
            reject: Some("b"),
            ..Default::default()
        });
        let channel = PushChannel::new(transport.clone(), AppInfo::default());
        let user = User::new("u-1", "Ada", "ada@example.com")
            .with_device("a", DevicePlatform::Android)
            .with_device("b", DevicePlatform::Ios);

        let err = channel.send(&user, &payload()).await.unwrap_err();
        assert!(err.to_string().contains("1 of 2 devices failed"));
        assert_eq!(transport.delivered.lock().unwrap().len(), 1);
    }
}
