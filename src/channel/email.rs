use std::sync::Arc;

use async_trait::async_trait;

use crate::notification::{AppInfo, MailMessage, NotificationPayload, User};

use super::{ChannelError, NotificationChannel, EMAIL_CHANNEL};

/// Outbound mail transport (SMTP, provider API, ...).
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send_mail(&self, to: &str, message: &MailMessage) -> Result<(), ChannelError>;
}

/// Transport that only logs the message. Used in development and tests.
#[derive(Debug, Default)]
pub struct LogMailTransport;

#[async_trait]
impl MailTransport for LogMailTransport {
    async fn send_mail(&self, to: &str, message: &MailMessage) -> Result<(), ChannelError> {
        tracing::info!(
            to = %to,
            subject = %message.subject,
            body_len = message.text_body().len(),
            "Mail sent (simulated)"
        );
        Ok(())
    }
}

pub struct EmailChannel {
    transport: Arc<dyn MailTransport>,
    app: AppInfo,
}

impl EmailChannel {
    pub fn new(transport: Arc<dyn MailTransport>, app: AppInfo) -> Self {
        Self { transport, app }
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn id(&self) -> &str {
        EMAIL_CHANNEL
    }

    async fn send(&self, user: &User, payload: &NotificationPayload) -> Result<(), ChannelError> {
        let Some(mail) = payload.render(&self.app).mail else {
            tracing::debug!(user_id = %user.id, payload = payload.kind(), "No mail representation, skipping");
            return Ok(());
        };

        self.transport.send_mail(&user.email, &mail).await?;
        tracing::info!(user_id = %user.id, to = %user.email, "Email notification sent");
        Ok(())
    }
}
