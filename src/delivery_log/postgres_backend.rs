//! PostgreSQL delivery log backend.
//!
//! Table structure (`notification_logs`):
//! - `id` (UUID primary key), `user_id`, `channel_slug`, `event_type`
//! - `payload_kind`, `payload` (JSONB with the full notification payload)
//! - `status` (`pending` | `sent` | `failed`), `error_message`, `sent_at`
//! - `created_at`, `updated_at`
//!
//! Recommended index for the recovery sweep:
//! `CREATE INDEX ON notification_logs (status, created_at)`.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::metrics::BackendMetrics;
use crate::notification::EventType;

use super::backend::{DeliveryLogBackend, DeliveryLogError};
use super::models::{DeliveryLogEntry, DeliveryLogStats, DeliveryStatus, LogQuery};

const SELECT_COLUMNS: &str = r#"
    id, user_id, channel_slug, event_type, payload_kind, payload,
    status, error_message, sent_at, created_at, updated_at
"#;

pub struct PostgresDeliveryLogBackend {
    pool: PgPool,
}

impl PostgresDeliveryLogBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_entry(row: &PgRow) -> Result<DeliveryLogEntry, DeliveryLogError> {
        let id: Uuid = row.try_get("id")?;
        let event_type: String = row.try_get("event_type")?;
        let status: String = row.try_get("status")?;

        let event_type = event_type
            .parse::<EventType>()
            .map_err(|e| DeliveryLogError::Corrupt {
                id,
                reason: e.to_string(),
            })?;
        let status = status
            .parse::<DeliveryStatus>()
            .map_err(|reason| DeliveryLogError::Corrupt { id, reason })?;

        Ok(DeliveryLogEntry {
            id,
            user_id: row.try_get("user_id")?,
            channel_id: row.try_get("channel_slug")?,
            event_type,
            payload_kind: row.try_get("payload_kind")?,
            payload: row.try_get("payload")?,
            status,
            error_message: row.try_get("error_message")?,
            sent_at: row.try_get("sent_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn record_operation<T>(operation: &str, started: Instant, result: &Result<T, sqlx::Error>) {
    BackendMetrics::record_latency("postgres", operation, started.elapsed().as_secs_f64());
    if result.is_err() {
        BackendMetrics::record_error("postgres", operation);
    }
}

#[async_trait]
impl DeliveryLogBackend for PostgresDeliveryLogBackend {
    async fn create_pending(&self, entry: DeliveryLogEntry) -> Result<(), DeliveryLogError> {
        let started = Instant::now();
        let result = sqlx::query(
            r#"
            INSERT INTO notification_logs
                (id, user_id, channel_slug, event_type, payload_kind, payload,
                 status, error_message, sent_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', NULL, NULL, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(entry.id)
        .bind(&entry.user_id)
        .bind(&entry.channel_id)
        .bind(entry.event_type.as_str())
        .bind(&entry.payload_kind)
        .bind(&entry.payload)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await;
        record_operation("create_pending", started, &result);

        if result?.rows_affected() == 0 {
            return Err(DeliveryLogError::Duplicate(entry.id));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DeliveryLogEntry>, DeliveryLogError> {
        let sql = format!("SELECT {} FROM notification_logs WHERE id = $1", SELECT_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::row_to_entry).transpose()
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool, DeliveryLogError> {
        let started = Instant::now();
        let result = sqlx::query(
            r#"
            UPDATE notification_logs
            SET status = 'sent', sent_at = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(sent_at)
        .execute(&self.pool)
        .await;
        record_operation("mark_sent", started, &result);

        Ok(result?.rows_affected() == 1)
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<bool, DeliveryLogError> {
        let started = Instant::now();
        let result = sqlx::query(
            r#"
            UPDATE notification_logs
            SET status = 'failed', error_message = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(error_message)
        .execute(&self.pool)
        .await;
        record_operation("mark_failed", started, &result);

        Ok(result?.rows_affected() == 1)
    }

    async fn find_stale_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeliveryLogEntry>, DeliveryLogError> {
        let sql = format!(
            r#"
            SELECT {} FROM notification_logs
            WHERE status = 'pending' AND created_at <= $1
            ORDER BY created_at ASC
            LIMIT $2
            "#,
            SELECT_COLUMNS
        );
        let started = Instant::now();
        let rows = sqlx::query(&sql)
            .bind(created_before)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await;
        record_operation("find_stale_pending", started, &rows);

        rows?.iter().map(Self::row_to_entry).collect()
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        query: &LogQuery,
    ) -> Result<Vec<DeliveryLogEntry>, DeliveryLogError> {
        let sql = format!(
            r#"
            SELECT {} FROM notification_logs
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(query.status.map(|s| s.as_str()))
            .bind(query.limit as i64)
            .bind(query.offset as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn stats(&self) -> Result<DeliveryLogStats, DeliveryLogError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM notification_logs GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut stats = DeliveryLogStats {
            backend_type: "postgres".to_string(),
            pending: 0,
            sent: 0,
            failed: 0,
        };
        for (status, count) in rows {
            let count = count.max(0) as u64;
            match status.parse::<DeliveryStatus>() {
                Ok(DeliveryStatus::Pending) => stats.pending = count,
                Ok(DeliveryStatus::Sent) => stats.sent = count,
                Ok(DeliveryStatus::Failed) => stats.failed = count,
                Err(reason) => tracing::warn!(reason = %reason, "Ignoring unknown log status"),
            }
        }
        Ok(stats)
    }
}
