//! In-memory delivery log backend using DashMap.
//!
//! Rows live only as long as the process. Suitable for development and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::backend::{DeliveryLogBackend, DeliveryLogError};
use super::models::{DeliveryLogEntry, DeliveryLogStats, DeliveryStatus, LogQuery};

#[derive(Default)]
pub struct MemoryDeliveryLogBackend {
    entries: DashMap<Uuid, DeliveryLogEntry>,
}

impl MemoryDeliveryLogBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of every row, oldest first.
    pub fn all(&self) -> Vec<DeliveryLogEntry> {
        let mut all: Vec<DeliveryLogEntry> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|e| e.created_at);
        all
    }

    /// Apply `finalize` to a pending row while holding its shard lock.
    fn transition<F>(&self, id: Uuid, finalize: F) -> bool
    where
        F: FnOnce(&mut DeliveryLogEntry),
    {
        match self.entries.get_mut(&id) {
            Some(mut entry) if entry.status == DeliveryStatus::Pending => {
                finalize(&mut entry);
                entry.updated_at = Utc::now();
                true
            }
            Some(_) => false,
            None => {
                tracing::warn!(log_id = %id, "Attempted to finalize unknown delivery log row");
                false
            }
        }
    }
}

#[async_trait]
impl DeliveryLogBackend for MemoryDeliveryLogBackend {
    async fn create_pending(&self, entry: DeliveryLogEntry) -> Result<(), DeliveryLogError> {
        match self.entries.entry(entry.id) {
            Entry::Occupied(_) => Err(DeliveryLogError::Duplicate(entry.id)),
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<DeliveryLogEntry>, DeliveryLogError> {
        Ok(self.entries.get(&id).map(|e| e.value().clone()))
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool, DeliveryLogError> {
        Ok(self.transition(id, |entry| {
            entry.status = DeliveryStatus::Sent;
            entry.sent_at = Some(sent_at);
        }))
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<bool, DeliveryLogError> {
        Ok(self.transition(id, |entry| {
            entry.status = DeliveryStatus::Failed;
            entry.error_message = Some(error_message.to_string());
        }))
    }

    async fn find_stale_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeliveryLogEntry>, DeliveryLogError> {
        let mut stale: Vec<DeliveryLogEntry> = self
            .entries
            .iter()
            .filter(|e| e.status == DeliveryStatus::Pending && e.created_at <= created_before)
            .map(|e| e.value().clone())
            .collect();
        stale.sort_by_key(|e| e.created_at);
        stale.truncate(limit);
        Ok(stale)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        query: &LogQuery,
    ) -> Result<Vec<DeliveryLogEntry>, DeliveryLogError> {
        let mut rows: Vec<DeliveryLogEntry> = self
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| query.status.map_or(true, |s| e.status == s))
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows.into_iter().skip(query.offset).take(query.limit).collect())
    }

    async fn stats(&self) -> Result<DeliveryLogStats, DeliveryLogError> {
        let mut stats = DeliveryLogStats {
            backend_type: "memory".to_string(),
            pending: 0,
            sent: 0,
            failed: 0,
        };
        for entry in self.entries.iter() {
            match entry.status {
                DeliveryStatus::Pending => stats.pending += 1,
                DeliveryStatus::Sent => stats.sent += 1,
                DeliveryStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NotificationPayload;
    use chrono::Duration;

    fn entry(user_id: &str, channel: &str) -> DeliveryLogEntry {
        let payload = NotificationPayload::PasswordChanged {
            user_id: user_id.to_string(),
            user_name: "Ada".to_string(),
        };
        DeliveryLogEntry::pending(user_id, channel, &payload).unwrap()
    }

    #[tokio::test]
    async fn test_mark_sent_once() {
        let backend = MemoryDeliveryLogBackend::new();
        let e = entry("u-1", "email");
        let id = e.id;
        backend.create_pending(e).await.unwrap();

        assert!(backend.mark_sent(id, Utc::now()).await.unwrap());
        assert!(!backend.mark_sent(id, Utc::now()).await.unwrap());
        assert!(!backend.mark_failed(id, "late failure").await.unwrap());

        let stored = backend.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, DeliveryStatus::Sent);
        assert!(stored.sent_at.is_some());
        assert!(stored.error_message.is_none());
    }

    #[tokio::test]
    async fn test_mark_failed_records_message() {
        let backend = MemoryDeliveryLogBackend::new();
        let e = entry("u-1", "sms");
        let id = e.id;
        backend.create_pending(e).await.unwrap();

        assert!(backend.mark_failed(id, "carrier down").await.unwrap());
        let stored = backend.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, DeliveryStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("carrier down"));
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_finalized() {
        let backend = MemoryDeliveryLogBackend::new();
        assert!(!backend.mark_sent(Uuid::new_v4(), Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let backend = MemoryDeliveryLogBackend::new();
        let e = entry("u-1", "email");
        backend.create_pending(e.clone()).await.unwrap();
        assert!(matches!(
            backend.create_pending(e).await,
            Err(DeliveryLogError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_find_stale_pending_oldest_first_and_bounded() {
        let backend = MemoryDeliveryLogBackend::new();
        let now = Utc::now();

        for minutes in [10, 30, 20] {
            let mut e = entry("u-1", "email");
            e.created_at = now - Duration::minutes(minutes);
            backend.create_pending(e).await.unwrap();
        }
        let fresh = entry("u-1", "email");
        backend.create_pending(fresh).await.unwrap();

        let mut done = entry("u-1", "sms");
        done.created_at = now - Duration::minutes(40);
        let done_id = done.id;
        backend.create_pending(done).await.unwrap();
        backend.mark_sent(done_id, now).await.unwrap();

        let cutoff = now - Duration::minutes(5);
        let stale = backend.find_stale_pending(cutoff, 2).await.unwrap();
        assert_eq!(stale.len(), 2);
        assert!(stale[0].created_at < stale[1].created_at);
        assert_eq!(stale[0].created_at, now - Duration::minutes(30));

        let all_stale = backend.find_stale_pending(cutoff, 100).await.unwrap();
        assert_eq!(all_stale.len(), 3);
    }

    #[tokio::test]
    async fn test_list_for_user_filters_and_paginates() {
        let backend = MemoryDeliveryLogBackend::new();
        for _ in 0..5 {
            backend.create_pending(entry("u-1", "email")).await.unwrap();
        }
        backend.create_pending(entry("u-2", "email")).await.unwrap();

        let page = LogQuery {
            limit: 2,
            offset: 1,
            status: None,
        };
        assert_eq!(backend.list_for_user("u-1", &page).await.unwrap().len(), 2);

        let sent_only = LogQuery {
            status: Some(DeliveryStatus::Sent),
            ..Default::default()
        };
        assert!(backend.list_for_user("u-1", &sent_only).await.unwrap().is_empty());

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.pending, 6);
    }
}
