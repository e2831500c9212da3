//! PostgreSQL preference backend.
//!
//! Table structure (`user_notification_preferences`):
//! - `user_id`, `channel_slug`, `event_type` with a unique constraint
//!   `user_channel_event_unique` over the three columns
//! - `is_enabled`, `created_at`, `updated_at`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::notification::EventType;

use super::backend::{Preference, PreferenceBackend, PreferenceBackendError, PreferenceKey};

pub struct PostgresPreferenceBackend {
    pool: PgPool,
}

impl PostgresPreferenceBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceBackend for PostgresPreferenceBackend {
    async fn get(&self, key: &PreferenceKey) -> Result<Option<bool>, PreferenceBackendError> {
        let row: Option<(bool,)> = sqlx::query_as(
            r#"
            SELECT is_enabled FROM user_notification_preferences
            WHERE user_id = $1 AND channel_slug = $2 AND event_type = $3
            "#,
        )
        .bind(&key.user_id)
        .bind(&key.channel_id)
        .bind(key.event_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(enabled,)| enabled))
    }

    async fn insert_if_absent(
        &self,
        key: PreferenceKey,
        enabled: bool,
    ) -> Result<bool, PreferenceBackendError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_notification_preferences
                (user_id, channel_slug, event_type, is_enabled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            ON CONFLICT (user_id, channel_slug, event_type) DO NOTHING
            "#,
        )
        .bind(&key.user_id)
        .bind(&key.channel_id)
        .bind(key.event_type.as_str())
        .bind(enabled)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn upsert(&self, key: PreferenceKey, enabled: bool) -> Result<(), PreferenceBackendError> {
        sqlx::query(
            r#"
            INSERT INTO user_notification_preferences
                (user_id, channel_slug, event_type, is_enabled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            ON CONFLICT (user_id, channel_slug, event_type)
            DO UPDATE SET is_enabled = EXCLUDED.is_enabled, updated_at = NOW()
            "#,
        )
        .bind(&key.user_id)
        .bind(&key.channel_id)
        .bind(key.event_type.as_str())
        .bind(enabled)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Preference>, PreferenceBackendError> {
        let rows: Vec<(String, String, bool, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT channel_slug, event_type, is_enabled, updated_at
            FROM user_notification_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut preferences = rows
            .into_iter()
            .map(|(channel_id, event_type, enabled, updated_at)| {
                let event_type = event_type
                    .parse::<EventType>()
                    .map_err(|_| PreferenceBackendError::Corrupt(format!("event_type {}", event_type)))?;
                Ok(Preference {
                    channel_id,
                    event_type,
                    enabled,
                    updated_at,
                })
            })
            .collect::<Result<Vec<_>, PreferenceBackendError>>()?;

        preferences.sort_by(|a, b| {
            a.event_type
                .cmp(&b.event_type)
                .then_with(|| a.channel_id.cmp(&b.channel_id))
        });
        Ok(preferences)
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}
