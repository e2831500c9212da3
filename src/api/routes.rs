use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::server::AppState;

use super::devices::{list_device_tokens, register_device_token, remove_device_token};
use super::events::{publish_event, record_login, upsert_user};
use super::health::{health, stats};
use super::metrics::prometheus_metrics;
use super::notifications::{
    list_notifications, mark_all_read, mark_read, notification_logs, trigger_test,
};
use super::preferences::{get_preferences, update_preferences};

/// Unauthenticated operational endpoints.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
}

/// Endpoints for end users, authenticated by JWT bearer token.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        // Inbox
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/test", post(trigger_test))
        .route("/notifications/{id}/read", post(mark_read))
        // Delivery history
        .route("/notification-logs", get(notification_logs))
        // Preferences
        .route("/preferences", get(get_preferences).put(update_preferences))
        // Push devices
        .route(
            "/device-tokens",
            get(list_device_tokens).post(register_device_token),
        )
        .route("/device-tokens/{id}", delete(remove_device_token))
}

/// Endpoints for the identity system, authenticated by X-API-Key.
pub fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/users/{id}", put(upsert_user))
        .route("/events", post(publish_event))
        .route("/logins", post(record_login))
}
