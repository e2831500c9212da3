//! PostgreSQL inbox backend.
//!
//! Table structure (`notifications`):
//! - `id` (UUID primary key), `user_id`, `type` (event type)
//! - `data` (JSONB with the rendered in-app record)
//! - `read_at`, `created_at`, `updated_at`
//!
//! Recommended index: `CREATE INDEX ON notifications (user_id, created_at DESC)`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::notification::DatabaseRecord;

use super::backend::{InAppNotification, InboxBackend, InboxError, InboxPage};

pub struct PostgresInboxBackend {
    pool: PgPool,
}

impl PostgresInboxBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_notification(row: &PgRow) -> Result<InAppNotification, InboxError> {
        let id: Uuid = row.try_get("id")?;
        let data: serde_json::Value = row.try_get("data")?;
        let data: DatabaseRecord = serde_json::from_value(data).map_err(|e| InboxError::Corrupt {
            id,
            reason: e.to_string(),
        })?;

        Ok(InAppNotification {
            id,
            user_id: row.try_get("user_id")?,
            data,
            read_at: row.try_get::<Option<DateTime<Utc>>, _>("read_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl InboxBackend for PostgresInboxBackend {
    async fn store(&self, user_id: &str, data: DatabaseRecord) -> Result<InAppNotification, InboxError> {
        let notification = InAppNotification::new(user_id, data);
        let payload = serde_json::to_value(&notification.data).map_err(|e| InboxError::Corrupt {
            id: notification.id,
            reason: e.to_string(),
        })?;

        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, type, data, read_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NULL, $5, $5)
            "#,
        )
        .bind(notification.id)
        .bind(&notification.user_id)
        .bind(notification.data.event_type.as_str())
        .bind(payload)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn list(
        &self,
        user_id: &str,
        unread_only: bool,
        limit: usize,
        offset: usize,
    ) -> Result<InboxPage, InboxError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, data, read_at, created_at
            FROM notifications
            WHERE user_id = $1 AND ($2 = FALSE OR read_at IS NULL)
            ORDER BY created_at DESC, id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND ($2 = FALSE OR read_at IS NULL)",
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_one(&self.pool)
        .await?;

        Ok(InboxPage {
            items: rows
                .iter()
                .map(Self::row_to_notification)
                .collect::<Result<_, _>>()?,
            total: total.max(0) as usize,
        })
    }

    async fn unread_count(&self, user_id: &str) -> Result<usize, InboxError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as usize)
    }

    async fn mark_read(&self, user_id: &str, id: Uuid) -> Result<bool, InboxError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET read_at = COALESCE(read_at, NOW()), updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<usize, InboxError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET read_at = NOW(), updated_at = NOW()
            WHERE user_id = $1 AND read_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as usize)
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}
