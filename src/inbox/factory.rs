//! Inbox backend factory

use std::sync::Arc;

use crate::config::StorageConfig;
use crate::postgres::PostgresPool;

use super::backend::InboxBackend;
use super::memory_backend::MemoryInboxBackend;
use super::postgres_backend::PostgresInboxBackend;

/// Create the in-app inbox for the configured storage backend.
///
/// Falls back to memory when `"postgres"` is requested without a pool.
pub fn create_inbox_backend(
    settings: &StorageConfig,
    postgres_pool: Option<Arc<PostgresPool>>,
) -> Arc<dyn InboxBackend> {
    match (settings.backend.as_str(), postgres_pool) {
        ("postgres", Some(pool)) => {
            tracing::info!(backend = "postgres", "Creating PostgreSQL inbox backend");
            Arc::new(PostgresInboxBackend::new(pool.pool().clone()))
        }
        ("postgres", None) => {
            tracing::warn!("PostgreSQL inbox backend requested but no pool provided, falling back to memory");
            Arc::new(MemoryInboxBackend::new())
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory inbox backend");
            Arc::new(MemoryInboxBackend::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_without_pool_falls_back() {
        let settings = StorageConfig {
            backend: "postgres".to_string(),
        };
        assert_eq!(create_inbox_backend(&settings, None).backend_type(), "memory");
    }
}
