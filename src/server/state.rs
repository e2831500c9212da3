use std::sync::Arc;
use std::time::Instant;

use crate::auth::JwtValidator;
use crate::channel::{register_builtin_channels, ChannelCatalog, ChannelRegistry};
use crate::config::Settings;
use crate::delivery_log::{create_delivery_log_backend, DeliveryLogBackend};
use crate::directory::{create_user_directory, UserDirectory};
use crate::dispatch::{DeliveryExecutor, DeliveryWorkerPool, NotificationDispatcher};
use crate::events::{LoginHistory, SecurityEventHandler};
use crate::inbox::{create_inbox_backend, InboxBackend};
use crate::postgres::PostgresPool;
use crate::preference::{create_preference_backend, PreferenceService};
use crate::queue::MemoryJobQueue;
use crate::tasks::RecoverySweep;

/// Shared components of the running service.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub jwt_validator: Arc<JwtValidator>,
    pub registry: Arc<ChannelRegistry>,
    pub preferences: Arc<PreferenceService>,
    pub delivery_logs: Arc<dyn DeliveryLogBackend>,
    pub queue: Arc<MemoryJobQueue>,
    pub users: Arc<dyn UserDirectory>,
    pub inbox: Arc<dyn InboxBackend>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub workers: Arc<DeliveryWorkerPool>,
    pub events: Arc<SecurityEventHandler>,
    pub recovery: Arc<RecoverySweep>,
    pub postgres_pool: Option<Arc<PostgresPool>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings, postgres_pool: Option<Arc<PostgresPool>>) -> Self {
        let jwt_validator = Arc::new(JwtValidator::new(&settings.jwt));
        let app = settings.app_info();

        let inbox = create_inbox_backend(&settings.storage, postgres_pool.clone());
        let registry = Arc::new(ChannelRegistry::new());
        register_builtin_channels(&registry, inbox.clone(), &app);

        let catalog = Arc::new(ChannelCatalog::with_builtin(&settings.channels.inactive));
        let preferences = Arc::new(PreferenceService::new(
            create_preference_backend(&settings.storage, postgres_pool.clone()),
            catalog,
        ));
        let delivery_logs = create_delivery_log_backend(&settings.storage, postgres_pool.clone());

        let queue = Arc::new(MemoryJobQueue::new(
            settings.delivery.queue_name.clone(),
            settings.delivery.queue_capacity,
        ));
        let users = create_user_directory(&settings.storage, postgres_pool.clone());

        let dispatcher = Arc::new(NotificationDispatcher::new(
            registry.clone(),
            preferences.clone(),
            delivery_logs.clone(),
            queue.clone(),
        ));
        let executor = Arc::new(DeliveryExecutor::new(
            registry.clone(),
            users.clone(),
            delivery_logs.clone(),
            queue.clone(),
            settings.retry_policy(),
        ));
        let workers = Arc::new(DeliveryWorkerPool::new(
            executor,
            queue.receiver(),
            settings.delivery.workers,
        ));
        let events = Arc::new(SecurityEventHandler::new(
            users.clone(),
            preferences.clone(),
            dispatcher.clone(),
            Arc::new(LoginHistory::new()),
        ));
        let recovery = Arc::new(RecoverySweep::new(
            registry.clone(),
            users.clone(),
            delivery_logs.clone(),
            settings.recovery_config(),
        ));

        tracing::info!(
            channels = ?registry.ids(),
            storage = %settings.storage.backend,
            queue = %settings.delivery.queue_name,
            "Application state initialized"
        );

        Self {
            settings: Arc::new(settings),
            jwt_validator,
            registry,
            preferences,
            delivery_logs,
            queue,
            users,
            inbox,
            dispatcher,
            workers,
            events,
            recovery,
            postgres_pool,
            start_time: Instant::now(),
        }
    }
}
