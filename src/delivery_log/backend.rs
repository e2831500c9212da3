//! Backend trait for delivery log storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::models::{DeliveryLogEntry, DeliveryLogStats, LogQuery};

#[derive(Debug, Error)]
pub enum DeliveryLogError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt log row {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },

    #[error("Duplicate log id: {0}")]
    Duplicate(Uuid),
}

/// Storage for delivery log rows.
///
/// # Atomicity
///
/// `mark_sent` and `mark_failed` are compare-and-set operations guarded on
/// `status = pending`. When a late job completion races with a recovery
/// sweep on the same row, exactly one of them wins and the other observes
/// `Ok(false)`.
#[async_trait]
pub trait DeliveryLogBackend: Send + Sync {
    /// Persist a new pending row.
    async fn create_pending(&self, entry: DeliveryLogEntry) -> Result<(), DeliveryLogError>;

    async fn get(&self, id: Uuid) -> Result<Option<DeliveryLogEntry>, DeliveryLogError>;

    /// Transition `pending -> sent`. Returns `false` if the row was not pending.
    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool, DeliveryLogError>;

    /// Transition `pending -> failed`. Returns `false` if the row was not pending.
    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<bool, DeliveryLogError>;

    /// Pending rows created at or before `created_before`, oldest first.
    async fn find_stale_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeliveryLogEntry>, DeliveryLogError>;

    /// A user's rows, newest first.
    async fn list_for_user(
        &self,
        user_id: &str,
        query: &LogQuery,
    ) -> Result<Vec<DeliveryLogEntry>, DeliveryLogError>;

    async fn stats(&self) -> Result<DeliveryLogStats, DeliveryLogError>;
}
