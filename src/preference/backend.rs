//! Backend trait for preference storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notification::EventType;

#[derive(Debug, Error)]
pub enum PreferenceBackendError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("Corrupt preference row: {0}")]
    Corrupt(String),
}

/// Identity of a preference row. At most one row exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PreferenceKey {
    pub user_id: String,
    pub channel_id: String,
    pub event_type: EventType,
}

impl PreferenceKey {
    pub fn new(user_id: &str, channel_id: &str, event_type: EventType) -> Self {
        Self {
            user_id: user_id.to_string(),
            channel_id: channel_id.to_string(),
            event_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preference {
    pub channel_id: String,
    pub event_type: EventType,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

/// Storage for explicit preference rows.
///
/// Absence of a row carries meaning (enabled by default), so backends never
/// synthesize rows on read.
#[async_trait]
pub trait PreferenceBackend: Send + Sync {
    /// Explicit flag for the key, if a row exists.
    async fn get(&self, key: &PreferenceKey) -> Result<Option<bool>, PreferenceBackendError>;

    /// Create the row only if none exists. Returns `true` if a row was inserted.
    async fn insert_if_absent(
        &self,
        key: PreferenceKey,
        enabled: bool,
    ) -> Result<bool, PreferenceBackendError>;

    /// Create or replace the row.
    async fn upsert(&self, key: PreferenceKey, enabled: bool) -> Result<(), PreferenceBackendError>;

    /// All rows of a user ordered by event type then channel.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Preference>, PreferenceBackendError>;

    fn backend_type(&self) -> &'static str;
}
