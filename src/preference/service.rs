use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::channel::ChannelCatalog;
use crate::notification::{EventType, NotifyError};

use super::backend::{Preference, PreferenceBackend, PreferenceBackendError, PreferenceKey};

/// One requested change in a bulk preference update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceUpdate {
    pub channel_slug: String,
    pub event_type: EventType,
    pub is_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedUpdate {
    pub channel_slug: String,
    pub event_type: EventType,
    pub reason: String,
}

/// Outcome of a bulk update. Every rejected entry is reported.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkUpdateResult {
    pub applied: Vec<PreferenceUpdate>,
    pub rejected: Vec<RejectedUpdate>,
}

/// Per-user, per-channel, per-event opt-out store.
///
/// Missing rows mean "enabled": security notices reach users for channels and
/// event types they never configured.
pub struct PreferenceService {
    backend: Arc<dyn PreferenceBackend>,
    catalog: Arc<ChannelCatalog>,
}

impl PreferenceService {
    pub fn new(backend: Arc<dyn PreferenceBackend>, catalog: Arc<ChannelCatalog>) -> Self {
        Self { backend, catalog }
    }

    pub fn catalog(&self) -> &Arc<ChannelCatalog> {
        &self.catalog
    }

    /// Whether `channel_id` should deliver `event_type` to the user.
    pub async fn is_enabled(&self, user_id: &str, channel_id: &str, event_type: EventType) -> bool {
        if !self.catalog.is_active(channel_id) {
            return false;
        }

        let key = PreferenceKey::new(user_id, channel_id, event_type);
        match self.backend.get(&key).await {
            Ok(Some(enabled)) => enabled,
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    channel = %channel_id,
                    event_type = %event_type,
                    error = %e,
                    "Preference lookup failed, treating channel as enabled"
                );
                true
            }
        }
    }

    /// Create an enabled row for every active channel and event type that has
    /// no row yet. Existing rows are left untouched, so replaying a
    /// registration never clobbers an explicit opt-out.
    ///
    /// Returns the number of rows created.
    pub async fn materialize_defaults(&self, user_id: &str) -> Result<usize, PreferenceBackendError> {
        let mut created = 0;
        for channel in self.catalog.active_slugs() {
            for event_type in EventType::ALL {
                let key = PreferenceKey::new(user_id, &channel, event_type);
                if self.backend.insert_if_absent(key, true).await? {
                    created += 1;
                }
            }
        }

        tracing::debug!(user_id = %user_id, created, "Materialized default preferences");
        Ok(created)
    }

    /// Apply each update independently. Unknown channel slugs and storage
    /// failures reject only their own entry.
    pub async fn bulk_update(&self, user_id: &str, updates: Vec<PreferenceUpdate>) -> BulkUpdateResult {
        let mut result = BulkUpdateResult::default();

        for update in updates {
            if !self.catalog.exists(&update.channel_slug) {
                let err = NotifyError::UnknownChannel(update.channel_slug.clone());
                result.rejected.push(RejectedUpdate {
                    channel_slug: update.channel_slug,
                    event_type: update.event_type,
                    reason: err.to_string(),
                });
                continue;
            }

            let key = PreferenceKey::new(user_id, &update.channel_slug, update.event_type);
            match self.backend.upsert(key, update.is_enabled).await {
                Ok(()) => result.applied.push(update),
                Err(e) => {
                    tracing::warn!(user_id = %user_id, channel = %update.channel_slug, error = %e, "Preference update failed");
                    result.rejected.push(RejectedUpdate {
                        channel_slug: update.channel_slug,
                        event_type: update.event_type,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            user_id = %user_id,
            applied = result.applied.len(),
            rejected = result.rejected.len(),
            "Preferences updated"
        );
        result
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<Preference>, PreferenceBackendError> {
        self.backend.list_for_user(user_id).await
    }
}
