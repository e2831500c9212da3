//! Delivery log: one audit row per (user, channel, notification).
//!
//! Rows are created `pending` before a delivery job is enqueued and are
//! finalized exactly once through the compare-and-set transitions on
//! [`DeliveryLogBackend`].

pub mod backend;
mod factory;
pub mod memory_backend;
pub mod models;
pub mod postgres_backend;

pub use backend::{DeliveryLogBackend, DeliveryLogError};
pub use factory::create_delivery_log_backend;
pub use memory_backend::MemoryDeliveryLogBackend;
pub use models::{DeliveryLogEntry, DeliveryLogStats, DeliveryStatus, LogQuery};
pub use postgres_backend::PostgresDeliveryLogBackend;
