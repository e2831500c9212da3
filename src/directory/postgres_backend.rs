//! PostgreSQL user directory.
//!
//! Table structure:
//! - `users`: `id` (TEXT primary key), `name`, `email`, `phone`,
//!   `created_at`, `updated_at`
//! - `device_tokens`: `id` (UUID primary key), `user_id` (references
//!   `users.id`), `token`, `platform` (`android` | `ios` | `web`),
//!   `device_name`, `is_active`, `created_at`, `updated_at`, with a unique
//!   constraint on `(user_id, token)`

use std::time::Instant;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::metrics::BackendMetrics;
use crate::notification::{DevicePlatform, DeviceToken, User};

use super::backend::{DeviceRegistration, UserDirectory, UserDirectoryError};

const DEVICE_COLUMNS: &str = "id, token, platform, device_name, is_active";

pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_device(row: &PgRow) -> Result<DeviceToken, UserDirectoryError> {
        let platform: String = row.try_get("platform")?;
        let platform = platform
            .parse::<DevicePlatform>()
            .map_err(UserDirectoryError::Corrupt)?;

        Ok(DeviceToken {
            id: row.try_get("id")?,
            token: row.try_get("token")?,
            platform,
            device_name: row.try_get("device_name")?,
            is_active: row.try_get("is_active")?,
        })
    }

    async fn fetch_user(&self, user_id: &str) -> Result<Option<User>, UserDirectoryError> {
        let Some(row) = sqlx::query("SELECT id, name, email, phone FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(User {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            device_tokens: self.device_tokens(user_id).await?,
        }))
    }

    async fn upsert_device(
        tx: &mut Transaction<'_, Postgres>,
        user_id: &str,
        registration: &DeviceRegistration,
        active: bool,
    ) -> Result<DeviceToken, UserDirectoryError> {
        let sql = format!(
            r#"
            INSERT INTO device_tokens
                (id, user_id, token, platform, device_name, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            ON CONFLICT (user_id, token) DO UPDATE SET
                platform = EXCLUDED.platform,
                device_name = EXCLUDED.device_name,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            RETURNING {}
            "#,
            DEVICE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(&registration.token)
            .bind(registration.platform.as_str())
            .bind(&registration.device_name)
            .bind(active)
            .fetch_one(&mut **tx)
            .await?;
        Self::row_to_device(&row)
    }
}

fn record_operation<T>(operation: &str, started: Instant, result: &Result<T, UserDirectoryError>) {
    BackendMetrics::record_latency("postgres", operation, started.elapsed().as_secs_f64());
    if result.is_err() {
        BackendMetrics::record_error("postgres", operation);
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, UserDirectoryError> {
        let started = Instant::now();
        let result = self.fetch_user(user_id).await;
        record_operation("find_user", started, &result);
        result
    }

    async fn upsert(&self, user: User) -> Result<User, UserDirectoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, phone, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                updated_at = NOW()
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .execute(&mut *tx)
        .await?;

        for device in &user.device_tokens {
            Self::upsert_device(&mut tx, &user.id, &device.into(), device.is_active).await?;
        }
        tx.commit().await?;

        self.find_by_id(&user.id)
            .await?
            .ok_or(UserDirectoryError::UserNotFound(user.id))
    }

    async fn count(&self) -> Result<usize, UserDirectoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }

    async fn device_tokens(&self, user_id: &str) -> Result<Vec<DeviceToken>, UserDirectoryError> {
        let sql = format!(
            "SELECT {} FROM device_tokens WHERE user_id = $1 ORDER BY created_at, id",
            DEVICE_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_device).collect()
    }

    async fn register_device(
        &self,
        user_id: &str,
        registration: DeviceRegistration,
    ) -> Result<DeviceToken, UserDirectoryError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1 FOR SHARE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(UserDirectoryError::UserNotFound(user_id.to_string()));
        }

        let device = Self::upsert_device(&mut tx, user_id, &registration, true).await?;
        tx.commit().await?;
        Ok(device)
    }

    async fn remove_device(&self, user_id: &str, device_id: Uuid) -> Result<bool, UserDirectoryError> {
        let result = sqlx::query("DELETE FROM device_tokens WHERE id = $1 AND user_id = $2")
            .bind(device_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}
