//! In-memory inbox using DashMap.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::notification::DatabaseRecord;

use super::backend::{InAppNotification, InboxBackend, InboxError, InboxPage};

/// Notifications per user, newest first.
#[derive(Default)]
pub struct MemoryInboxBackend {
    inbox: DashMap<String, Vec<InAppNotification>>,
}

impl MemoryInboxBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InboxBackend for MemoryInboxBackend {
    async fn store(&self, user_id: &str, data: DatabaseRecord) -> Result<InAppNotification, InboxError> {
        let notification = InAppNotification::new(user_id, data);
        self.inbox
            .entry(user_id.to_string())
            .or_default()
            .insert(0, notification.clone());
        Ok(notification)
    }

    async fn list(
        &self,
        user_id: &str,
        unread_only: bool,
        limit: usize,
        offset: usize,
    ) -> Result<InboxPage, InboxError> {
        let Some(items) = self.inbox.get(user_id) else {
            return Ok(InboxPage {
                items: Vec::new(),
                total: 0,
            });
        };

        let matching: Vec<&InAppNotification> = items
            .iter()
            .filter(|n| !unread_only || !n.is_read())
            .collect();
        Ok(InboxPage {
            total: matching.len(),
            items: matching.into_iter().skip(offset).take(limit).cloned().collect(),
        })
    }

    async fn unread_count(&self, user_id: &str) -> Result<usize, InboxError> {
        Ok(self
            .inbox
            .get(user_id)
            .map(|items| items.iter().filter(|n| !n.is_read()).count())
            .unwrap_or(0))
    }

    async fn mark_read(&self, user_id: &str, id: Uuid) -> Result<bool, InboxError> {
        let Some(mut items) = self.inbox.get_mut(user_id) else {
            return Ok(false);
        };
        match items.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                if n.read_at.is_none() {
                    n.read_at = Some(Utc::now());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<usize, InboxError> {
        let Some(mut items) = self.inbox.get_mut(user_id) else {
            return Ok(0);
        };
        let now = Utc::now();
        let mut changed = 0;
        for n in items.iter_mut().filter(|n| n.read_at.is_none()) {
            n.read_at = Some(now);
            changed += 1;
        }
        Ok(changed)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
