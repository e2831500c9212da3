use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::dispatch::RetryPolicy;
use crate::notification::AppInfo;
use crate::tasks::RecoveryConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub recovery: RecoverySettings,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    pub key: Option<String>,
}

/// Branding used when rendering notification content.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_app_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_queue_name")]
    pub queue_name: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts, in seconds
    #[serde(default = "default_backoff_seconds")]
    pub backoff_seconds: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecoverySettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_recovery_interval")]
    pub interval_seconds: u64,
    /// Age after which a pending row is considered lost
    #[serde(default = "default_stale_after")]
    pub stale_after_seconds: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Storage backend selection: `memory` (default) or `postgres`.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelsConfig {
    /// Channel slugs seeded as inactive
    #[serde(default)]
    pub inactive: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_app_name() -> String {
    "Ara".to_string()
}

fn default_app_url() -> String {
    "http://localhost".to_string()
}

fn default_queue_name() -> String {
    "notifications".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_seconds() -> u64 {
    30
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_true() -> bool {
    true
}

fn default_recovery_interval() -> u64 {
    60 // 1 minute
}

fn default_stale_after() -> u64 {
    300 // 5 minutes
}

fn default_batch_size() -> usize {
    100
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

fn default_database_url() -> String {
    "postgres://localhost:5432/notifications".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    300
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8081)?
            .set_default("delivery.queue_name", "notifications")?
            .set_default("delivery.max_attempts", 3)?
            .set_default("delivery.backoff_seconds", 30)?
            .set_default("recovery.interval_seconds", 60)?
            .set_default("recovery.stale_after_seconds", 300)?
            .set_default("storage.backend", "memory")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER__PORT, JWT__SECRET, DELIVERY__BACKOFF_SECONDS, CHANNELS__INACTIVE, etc.
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("channels.inactive")
                    .with_list_parse_key("server.cors_origins"),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Cross-section checks that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delivery.max_attempts == 0 {
            return Err(ConfigError::Message(
                "delivery.max_attempts must be at least 1".to_string(),
            ));
        }
        // Workers enqueue their own retries; an immediate retry into a full
        // queue would block every worker.
        if self.delivery.backoff_seconds == 0 {
            return Err(ConfigError::Message(
                "delivery.backoff_seconds must be at least 1".to_string(),
            ));
        }
        if self.recovery.enabled {
            self.recovery_config()
                .validate(self.retry_policy().retry_window())
                .map_err(|e| ConfigError::Message(format!("recovery: {}", e)))?;
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.delivery.max_attempts,
            backoff: Duration::from_secs(self.delivery.backoff_seconds),
        }
    }

    pub fn recovery_config(&self) -> RecoveryConfig {
        RecoveryConfig {
            interval: Duration::from_secs(self.recovery.interval_seconds),
            stale_after: Duration::from_secs(self.recovery.stale_after_seconds),
            batch_size: self.recovery.batch_size,
        }
    }

    pub fn app_info(&self) -> AppInfo {
        AppInfo {
            name: self.app.name.clone(),
            url: self.app.url.clone(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            url: default_app_url(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            queue_name: default_queue_name(),
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            backoff_seconds: default_backoff_seconds(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_recovery_interval(),
            stale_after_seconds: default_stale_after(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            server: ServerConfig::default(),
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                issuer: None,
                audience: None,
            },
            api: ApiConfig::default(),
            app: AppConfig::default(),
            delivery: DeliveryConfig::default(),
            recovery: RecoverySettings::default(),
            storage: StorageConfig::default(),
            database: DatabaseConfig::default(),
            channels: ChannelsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8081);

        let s = settings();
        assert_eq!(s.delivery.queue_name, "notifications");
        assert_eq!(s.retry_policy(), RetryPolicy::default());
        assert_eq!(s.recovery_config(), RecoveryConfig::default());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_stale_threshold_must_exceed_retry_window() {
        let mut s = settings();
        s.delivery.backoff_seconds = 120;
        assert!(s.validate().is_err());

        s.recovery.enabled = false;
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut s = settings();
        s.delivery.max_attempts = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_zero_backoff_rejected() {
        let mut s = settings();
        s.recovery.enabled = false;
        s.delivery.backoff_seconds = 0;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("backoff_seconds"));

        s.delivery.backoff_seconds = 1;
        assert!(s.validate().is_ok());
    }
}
