//! Prometheus metrics endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::metrics;
use crate::server::AppState;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    update_metrics_from_state(&state).await;

    match metrics::encode_metrics() {
        Ok(output) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode Prometheus metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(axum::http::header::CONTENT_TYPE, "text/plain")],
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Refresh gauges derived from application state
async fn update_metrics_from_state(state: &AppState) {
    metrics::CHANNELS_REGISTERED.set(state.registry.len() as i64);
    if let Ok(count) = state.users.count().await {
        metrics::USERS_KNOWN.set(count as i64);
    }

    if let Ok(stats) = state.delivery_logs.stats().await {
        metrics::DELIVERY_LOG_ROWS
            .with_label_values(&["pending"])
            .set(stats.pending as i64);
        metrics::DELIVERY_LOG_ROWS
            .with_label_values(&["sent"])
            .set(stats.sent as i64);
        metrics::DELIVERY_LOG_ROWS
            .with_label_values(&["failed"])
            .set(stats.failed as i64);
    }
}
