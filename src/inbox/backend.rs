//! Backend trait for in-app notification storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::notification::DatabaseRecord;

#[derive(Debug, Error)]
pub enum InboxError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("Corrupt in-app notification {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },
}

/// A stored in-app notification.
#[derive(Debug, Clone, Serialize)]
pub struct InAppNotification {
    pub id: Uuid,
    pub user_id: String,
    pub data: DatabaseRecord,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl InAppNotification {
    pub fn new(user_id: &str, data: DatabaseRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            data,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// One page of a user's inbox, newest first, with the unpaged total.
#[derive(Debug, Clone)]
pub struct InboxPage {
    pub items: Vec<InAppNotification>,
    pub total: usize,
}

/// Per-user inbox of in-app notifications.
#[async_trait]
pub trait InboxBackend: Send + Sync {
    async fn store(&self, user_id: &str, data: DatabaseRecord) -> Result<InAppNotification, InboxError>;

    async fn list(
        &self,
        user_id: &str,
        unread_only: bool,
        limit: usize,
        offset: usize,
    ) -> Result<InboxPage, InboxError>;

    async fn unread_count(&self, user_id: &str) -> Result<usize, InboxError>;

    /// Returns `false` when the user has no such notification. Marking an
    /// already read notification keeps its original `read_at`.
    async fn mark_read(&self, user_id: &str, id: Uuid) -> Result<bool, InboxError>;

    /// Returns how many notifications changed.
    async fn mark_all_read(&self, user_id: &str) -> Result<usize, InboxError>;

    fn backend_type(&self) -> &'static str;
}
