//! Preference backend factory

use std::sync::Arc;

use crate::config::StorageConfig;
use crate::postgres::PostgresPool;

use super::backend::PreferenceBackend;
use super::memory_backend::MemoryPreferenceBackend;
use super::postgres_backend::PostgresPreferenceBackend;

/// Create a preference backend based on configuration.
///
/// - `"postgres"`: `PostgresPreferenceBackend` if a pool is provided
/// - `"memory"` (default): `MemoryPreferenceBackend`
pub fn create_preference_backend(
    settings: &StorageConfig,
    postgres_pool: Option<Arc<PostgresPool>>,
) -> Arc<dyn PreferenceBackend> {
    match settings.backend.as_str() {
        "postgres" => {
            if let Some(pool) = postgres_pool {
                tracing::info!(backend = "postgres", "Creating PostgreSQL preference backend");
                Arc::new(PostgresPreferenceBackend::new(pool.pool().clone()))
            } else {
                tracing::warn!(
                    "PostgreSQL preference backend requested but no pool provided, falling back to memory"
                );
                Arc::new(MemoryPreferenceBackend::new())
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory preference backend");
            Arc::new(MemoryPreferenceBackend::new())
        }
    }
}
