//! Backend trait for the user directory.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::notification::{DevicePlatform, DeviceToken, User};

const MAX_TOKEN_LEN: usize = 500;
const MAX_DEVICE_NAME_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum UserDirectoryError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Corrupt user directory row: {0}")]
    Corrupt(String),
}

/// A device registering for push.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceRegistration {
    pub token: String,
    pub platform: DevicePlatform,
    #[serde(default)]
    pub device_name: Option<String>,
}

impl DeviceRegistration {
    pub fn new(token: impl Into<String>, platform: DevicePlatform) -> Self {
        Self {
            token: token.into(),
            platform,
            device_name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.token.trim().is_empty() {
            return Err("token is required".to_string());
        }
        if self.token.len() > MAX_TOKEN_LEN {
            return Err(format!("token may not exceed {} characters", MAX_TOKEN_LEN));
        }
        if self
            .device_name
            .as_ref()
            .is_some_and(|n| n.len() > MAX_DEVICE_NAME_LEN)
        {
            return Err(format!(
                "device_name may not exceed {} characters",
                MAX_DEVICE_NAME_LEN
            ));
        }
        Ok(())
    }
}

impl From<&DeviceToken> for DeviceRegistration {
    fn from(token: &DeviceToken) -> Self {
        Self {
            token: token.token.clone(),
            platform: token.platform,
            device_name: token.device_name.clone(),
        }
    }
}

/// Users and their push devices.
///
/// Profiles are synced in by the account system. Device tokens are keyed by
/// `(user, token)`; registering a known token updates it in place and
/// reactivates it.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, UserDirectoryError>;

    /// Create or replace the profile, then register each of `user.device_tokens`.
    /// Devices already registered for the user are kept. Returns the stored user.
    async fn upsert(&self, user: User) -> Result<User, UserDirectoryError>;

    async fn count(&self) -> Result<usize, UserDirectoryError>;

    async fn device_tokens(&self, user_id: &str) -> Result<Vec<DeviceToken>, UserDirectoryError>;

    /// Register or refresh a device. Fails with `UserNotFound` for unknown users.
    async fn register_device(
        &self,
        user_id: &str,
        registration: DeviceRegistration,
    ) -> Result<DeviceToken, UserDirectoryError>;

    /// Remove one of the user's devices. Returns `false` when the user has no
    /// device with that id.
    async fn remove_device(&self, user_id: &str, device_id: Uuid) -> Result<bool, UserDirectoryError>;

    fn backend_type(&self) -> &'static str;
}
