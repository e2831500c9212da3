//! Notification preferences.
//!
//! # Architecture
//!
//! - `PreferenceBackend`: storage abstraction for explicit rows
//!   - `MemoryPreferenceBackend`: DashMap storage (default)
//!   - `PostgresPreferenceBackend`: `user_notification_preferences` table
//! - `PreferenceService`: fail-open lookups, default materialization, bulk updates
//!
//! Use `create_preference_backend()` to pick the backend from configuration.

pub mod backend;
mod factory;
pub mod memory_backend;
pub mod postgres_backend;
mod service;

pub use backend::{Preference, PreferenceBackend, PreferenceBackendError, PreferenceKey};
pub use factory::create_preference_backend;
pub use memory_backend::MemoryPreferenceBackend;
pub use postgres_backend::PostgresPreferenceBackend;
pub use service::{BulkUpdateResult, PreferenceService, PreferenceUpdate, RejectedUpdate};
