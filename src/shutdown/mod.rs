//! Graceful shutdown handling for the notification service.
//!
//! 1. Signals background tasks (delivery workers, recovery sweep) to stop
//! 2. Waits, bounded, for them to finish their current job
//! 3. Closes the PostgreSQL pool, if any
//!
//! Jobs still in the in-memory queue are dropped; their log rows stay
//! `pending` and are picked up by the recovery sweep after restart.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::postgres::PostgresPool;

#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time to wait for background tasks to stop (default: 10 seconds)
    pub drain_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(10),
        }
    }
}

pub struct GracefulShutdown {
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
    postgres_pool: Option<Arc<PostgresPool>>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    pub fn new(shutdown_tx: broadcast::Sender<()>) -> Self {
        Self::with_config(shutdown_tx, ShutdownConfig::default())
    }

    pub fn with_config(shutdown_tx: broadcast::Sender<()>, config: ShutdownConfig) -> Self {
        Self {
            shutdown_tx,
            tasks: Vec::new(),
            postgres_pool: None,
            config,
        }
    }

    /// Track a background task that must stop before the process exits.
    pub fn track(&mut self, handle: JoinHandle<()>) {
        self.tasks.push(handle);
    }

    pub fn track_all(&mut self, handles: impl IntoIterator<Item = JoinHandle<()>>) {
        self.tasks.extend(handles);
    }

    pub fn with_postgres_pool(mut self, pool: Option<Arc<PostgresPool>>) -> Self {
        self.postgres_pool = pool;
        self
    }

    #[tracing::instrument(name = "graceful_shutdown", skip(self), fields(tasks = self.tasks.len()))]
    pub async fn execute(self, reason: &str) -> ShutdownResult {
        let start = Instant::now();
        let total = self.tasks.len();

        tracing::info!(reason = %reason, "Starting graceful shutdown - Phase 1: Signaling background tasks");
        let _ = self.shutdown_tx.send(());

        tracing::info!("Phase 2: Waiting for background tasks to stop");
        let tasks_stopped = match timeout(self.config.drain_timeout, join_all(self.tasks)).await {
            Ok(results) => results.iter().filter(|r| r.is_ok()).count(),
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.config.drain_timeout.as_secs(),
                    "Background tasks did not stop in time"
                );
                0
            }
        };

        if let Some(pool) = self.postgres_pool {
            tracing::info!("Phase 3: Closing PostgreSQL pool");
            pool.close().await;
        }

        let result = ShutdownResult {
            success: tasks_stopped == total,
            tasks_stopped,
            duration: start.elapsed(),
        };

        tracing::info!(
            tasks_stopped = result.tasks_stopped,
            total_tasks = total,
            duration_ms = result.duration.as_millis(),
            "Graceful shutdown completed"
        );

        result
    }
}

#[derive(Debug, Default)]
pub struct ShutdownResult {
    /// Whether every tracked task stopped in time
    pub success: bool,
    pub tasks_stopped: usize,
    pub duration: Duration,
}
