use std::sync::Arc;

use async_trait::async_trait;

use crate::notification::{AppInfo, NotificationPayload, User};

use super::{ChannelError, NotificationChannel, SMS_CHANNEL};

/// Outbound SMS provider.
#[async_trait]
pub trait SmsTransport: Send + Sync {
    async fn send_sms(&self, to: &str, text: &str) -> Result<(), ChannelError>;
}

/// Simulated provider that logs each message.
#[derive(Debug, Clone)]
pub struct LogSmsTransport {
    provider: String,
}

impl LogSmsTransport {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }
}

impl Default for LogSmsTransport {
    fn default() -> Self {
        Self::new("simulated")
    }
}

#[async_trait]
impl SmsTransport for LogSmsTransport {
    async fn send_sms(&self, to: &str, text: &str) -> Result<(), ChannelError> {
        tracing::info!(
            to = %to,
            message = %text,
            provider = %self.provider,
            "SMS sent (simulated)"
        );
        Ok(())
    }
}

pub struct SmsChannel {
    transport: Arc<dyn SmsTransport>,
    app: AppInfo,
}

impl SmsChannel {
    pub fn new(transport: Arc<dyn SmsTransport>, app: AppInfo) -> Self {
        Self { transport, app }
    }
}

#[async_trait]
impl NotificationChannel for SmsChannel {
    fn id(&self) -> &str {
        SMS_CHANNEL
    }

    async fn send(&self, user: &User, payload: &NotificationPayload) -> Result<(), ChannelError> {
        let Some(text) = payload.render(&self.app).sms else {
            tracing::debug!(user_id = %user.id, payload = payload.kind(), "No SMS representation, skipping");
            return Ok(());
        };

        // No phone number on file is a skip, not a failure.
        let Some(ref phone) = user.phone else {
            tracing::debug!(user_id = %user.id, "User has no phone number, skipping SMS");
            return Ok(());
        };

        self.transport.send_sms(phone, &text).await
    }
}
