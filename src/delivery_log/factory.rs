//! Delivery log backend factory

use std::sync::Arc;

use crate::config::StorageConfig;
use crate::postgres::PostgresPool;

use super::backend::DeliveryLogBackend;
use super::memory_backend::MemoryDeliveryLogBackend;
use super::postgres_backend::PostgresDeliveryLogBackend;

/// Create a delivery log backend based on configuration.
///
/// Falls back to memory when `"postgres"` is requested without a pool.
pub fn create_delivery_log_backend(
    settings: &StorageConfig,
    postgres_pool: Option<Arc<PostgresPool>>,
) -> Arc<dyn DeliveryLogBackend> {
    match (settings.backend.as_str(), postgres_pool) {
        ("postgres", Some(pool)) => {
            tracing::info!(backend = "postgres", "Creating PostgreSQL delivery log backend");
            Arc::new(PostgresDeliveryLogBackend::new(pool.pool().clone()))
        }
        ("postgres", None) => {
            tracing::warn!(
                "PostgreSQL delivery log backend requested but no pool provided, falling back to memory"
            );
            Arc::new(MemoryDeliveryLogBackend::new())
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory delivery log backend");
            Arc::new(MemoryDeliveryLogBackend::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_postgres_without_pool_falls_back() {
        let settings = StorageConfig {
            backend: "postgres".to_string(),
        };
        let backend = create_delivery_log_backend(&settings, None);
        assert_eq!(backend.stats().await.unwrap().backend_type, "memory");
    }
}
