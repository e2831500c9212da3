//! User directory factory

use std::sync::Arc;

use crate::config::StorageConfig;
use crate::postgres::PostgresPool;

use super::backend::UserDirectory;
use super::memory_backend::MemoryUserDirectory;
use super::postgres_backend::PostgresUserDirectory;

/// Create the user directory for the configured storage backend.
///
/// Falls back to memory when `"postgres"` is requested without a pool.
pub fn create_user_directory(
    settings: &StorageConfig,
    postgres_pool: Option<Arc<PostgresPool>>,
) -> Arc<dyn UserDirectory> {
    match (settings.backend.as_str(), postgres_pool) {
        ("postgres", Some(pool)) => {
            tracing::info!(backend = "postgres", "Creating PostgreSQL user directory");
            Arc::new(PostgresUserDirectory::new(pool.pool().clone()))
        }
        ("postgres", None) => {
            tracing::warn!("PostgreSQL user directory requested but no pool provided, falling back to memory");
            Arc::new(MemoryUserDirectory::new())
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory user directory");
            Arc::new(MemoryUserDirectory::new())
        }
    }
}
