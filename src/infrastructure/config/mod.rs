mod settings;

pub use settings::{
    ApiConfig, AppConfig, ChannelsConfig, DatabaseConfig, DeliveryConfig, JwtConfig,
    LoggingConfig, RecoverySettings, ServerConfig, Settings, StorageConfig,
};
