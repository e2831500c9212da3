//! In-app channel: stores a structured record in the user's inbox.

use std::sync::Arc;

use async_trait::async_trait;

use crate::inbox::InboxBackend;
use crate::notification::{AppInfo, NotificationPayload, User};

use super::{ChannelError, NotificationChannel, DATABASE_CHANNEL};

/// Channel writing to an [`InboxBackend`].
pub struct InAppChannel {
    inbox: Arc<dyn InboxBackend>,
    app: AppInfo,
}

impl InAppChannel {
    pub fn new(inbox: Arc<dyn InboxBackend>, app: AppInfo) -> Self {
        Self { inbox, app }
    }
}

#[async_trait]
impl NotificationChannel for InAppChannel {
    fn id(&self) -> &str {
        DATABASE_CHANNEL
    }

    async fn send(&self, user: &User, payload: &NotificationPayload) -> Result<(), ChannelError> {
        let Some(record) = payload.render(&self.app).database else {
            tracing::debug!(
                user_id = %user.id,
                payload = payload.kind(),
                "Payload has no in-app representation, skipping"
            );
            return Ok(());
        };

        let stored = self
            .inbox
            .store(&user.id, record)
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        tracing::debug!(user_id = %user.id, notification_id = %stored.id, "Stored in-app notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::MemoryInboxBackend;

    #[tokio::test]
    async fn test_send_stores_record() {
        let inbox = Arc::new(MemoryInboxBackend::new());
        let channel = InAppChannel::new(inbox.clone(), AppInfo::default());
        let user = User::new("u-1", "Ada", "ada@example.com");
        let payload = NotificationPayload::PasswordChanged {
            user_id: "u-1".to_string(),
            user_name: "Ada".to_string(),
        };

        channel.send(&user, &payload).await.unwrap();

        let page = inbox.list("u-1", false, 15, 0).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].data.title, "Password Changed");
    }
}
