//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::delivery_log::DeliveryLogStats;
use crate::dispatch::{DispatcherStatsSnapshot, WorkerPoolStats};
use crate::queue::QueueStats;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub storage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresHealthResponse>,
    pub channels: Vec<String>,
    pub queue: QueueHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct PostgresHealthResponse {
    pub status: String,
    pub connected: bool,
    pub pool_size: u32,
    pub idle_connections: u32,
}

#[derive(Debug, Serialize)]
pub struct QueueHealthResponse {
    pub name: String,
    pub workers: usize,
    pub delayed: u64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub dispatcher: DispatcherStatsSnapshot,
    pub workers: WorkerPoolStats,
    pub queue: QueueStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_log: Option<DeliveryLogStats>,
    pub recovery: RecoveryStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecoveryStats {
    pub enabled: bool,
    pub running: bool,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let postgres = match state.postgres_pool {
        Some(ref pool) => {
            let connected = pool.ping().await;
            let inner_pool = pool.pool();
            Some(PostgresHealthResponse {
                status: if connected { "connected" } else { "unreachable" }.to_string(),
                connected,
                pool_size: inner_pool.size(),
                idle_connections: inner_pool.num_idle() as u32,
            })
        }
        None => None,
    };

    let healthy = postgres.as_ref().map_or(true, |p| p.connected);
    let status = if healthy { "healthy" } else { "degraded" };
    let queue_stats = state.queue.stats();

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        storage: state.settings.storage.backend.clone(),
        postgres,
        channels: state.registry.ids(),
        queue: QueueHealthResponse {
            name: queue_stats.name,
            workers: state.settings.delivery.workers,
            delayed: queue_stats.delayed,
        },
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let users = match state.users.count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to count users");
            None
        }
    };

    let delivery_log = match state.delivery_logs.stats().await {
        Ok(stats) => Some(stats),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read delivery log stats");
            None
        }
    };

    Json(StatsResponse {
        dispatcher: state.dispatcher.stats(),
        workers: state.workers.stats(),
        queue: state.queue.stats(),
        delivery_log,
        recovery: RecoveryStats {
            enabled: state.settings.recovery.enabled,
            running: state.recovery.is_running(),
        },
        users,
    })
}
