use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use security_notification_service::config::Settings;
use security_notification_service::postgres::PostgresPool;
use security_notification_service::server::{create_app, AppState};
use security_notification_service::shutdown::GracefulShutdown;
use security_notification_service::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    init_tracing(&settings.logging)?;
    tracing::info!("Configuration loaded");

    // Connect to PostgreSQL when persistent storage is selected
    let postgres_pool = if settings.storage.backend == "postgres" {
        Some(Arc::new(PostgresPool::new(&settings.database).await?))
    } else {
        None
    };

    // Create application state
    let state = AppState::new(settings.clone(), postgres_pool.clone());

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut shutdown = GracefulShutdown::new(shutdown_tx.clone()).with_postgres_pool(postgres_pool);

    // Start delivery workers
    shutdown.track_all(state.workers.spawn(&shutdown_tx));

    // Start recovery sweep
    if settings.recovery.enabled {
        let recovery = state.recovery.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        shutdown.track(tokio::spawn(async move {
            recovery.run(shutdown_rx).await;
        }));
    } else {
        tracing::warn!("Recovery sweep disabled; stranded pending deliveries will not be retried");
    }

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server until a termination signal arrives
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler())
        .await?;

    let result = shutdown.execute("termination signal").await;
    if !result.success {
        tracing::warn!(
            tasks_stopped = result.tasks_stopped,
            "Some background tasks did not stop cleanly"
        );
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
