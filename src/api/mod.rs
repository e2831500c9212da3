//! API layer - HTTP endpoint handlers organized by domain.

mod devices;
mod events;
mod health;
mod metrics;
mod notifications;
mod preferences;
mod routes;

// Re-export all handlers for use in server/app.rs
pub use devices::{list_device_tokens, register_device_token, remove_device_token};
pub use events::{publish_event, record_login, upsert_user};
pub use health::{health, stats};
pub use metrics::prometheus_metrics;
pub use notifications::{
    list_notifications, mark_all_read, mark_read, notification_logs, trigger_test,
};
pub use preferences::{get_preferences, update_preferences};
pub use routes::{public_routes, service_routes, user_routes};
