//! In-memory preference backend using DashMap.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::backend::{Preference, PreferenceBackend, PreferenceBackendError, PreferenceKey};

/// Preference rows keyed by (user, channel, event type).
///
/// `DashMap::entry` holds the shard lock for the duration of the
/// insert-if-absent check, so concurrent materializations cannot duplicate or
/// overwrite a row.
#[derive(Default)]
pub struct MemoryPreferenceBackend {
    rows: DashMap<PreferenceKey, (bool, DateTime<Utc>)>,
}

impl MemoryPreferenceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl PreferenceBackend for MemoryPreferenceBackend {
    async fn get(&self, key: &PreferenceKey) -> Result<Option<bool>, PreferenceBackendError> {
        Ok(self.rows.get(key).map(|r| r.0))
    }

    async fn insert_if_absent(
        &self,
        key: PreferenceKey,
        enabled: bool,
    ) -> Result<bool, PreferenceBackendError> {
        match self.rows.entry(key) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert((enabled, Utc::now()));
                Ok(true)
            }
        }
    }

    async fn upsert(&self, key: PreferenceKey, enabled: bool) -> Result<(), PreferenceBackendError> {
        self.rows.insert(key, (enabled, Utc::now()));
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Preference>, PreferenceBackendError> {
        let mut rows: Vec<Preference> = self
            .rows
            .iter()
            .filter(|r| r.key().user_id == user_id)
            .map(|r| Preference {
                channel_id: r.key().channel_id.clone(),
                event_type: r.key().event_type,
                enabled: r.value().0,
                updated_at: r.value().1,
            })
            .collect();
        rows.sort_by(|a, b| {
            a.event_type
                .cmp(&b.event_type)
                .then_with(|| a.channel_id.cmp(&b.channel_id))
        });
        Ok(rows)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
