//! In-memory user directory using DashMap.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::notification::{DeviceToken, User};

use super::backend::{DeviceRegistration, UserDirectory, UserDirectoryError};

#[derive(Default)]
pub struct MemoryUserDirectory {
    users: DashMap<String, User>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove(&self, user_id: &str) -> Option<User> {
        self.users.remove(user_id).map(|(_, u)| u)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Update the device with the same token in place, or append a new one.
fn merge_device(devices: &mut Vec<DeviceToken>, registration: DeviceRegistration, active: bool) -> DeviceToken {
    if let Some(existing) = devices.iter_mut().find(|d| d.token == registration.token) {
        existing.platform = registration.platform;
        existing.device_name = registration.device_name;
        existing.is_active = active;
        return existing.clone();
    }

    let mut device = DeviceToken::new(registration.token, registration.platform);
    device.device_name = registration.device_name;
    device.is_active = active;
    devices.push(device.clone());
    device
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, UserDirectoryError> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }

    async fn upsert(&self, user: User) -> Result<User, UserDirectoryError> {
        let mut stored = self
            .users
            .entry(user.id.clone())
            .or_insert_with(|| User::new(user.id.as_str(), "", ""));
        stored.name = user.name;
        stored.email = user.email;
        stored.phone = user.phone;
        for device in &user.device_tokens {
            merge_device(&mut stored.device_tokens, device.into(), device.is_active);
        }
        Ok(stored.clone())
    }

    async fn count(&self) -> Result<usize, UserDirectoryError> {
        Ok(self.users.len())
    }

    async fn device_tokens(&self, user_id: &str) -> Result<Vec<DeviceToken>, UserDirectoryError> {
        Ok(self
            .users
            .get(user_id)
            .map(|u| u.device_tokens.clone())
            .unwrap_or_default())
    }

    async fn register_device(
        &self,
        user_id: &str,
        registration: DeviceRegistration,
    ) -> Result<DeviceToken, UserDirectoryError> {
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| UserDirectoryError::UserNotFound(user_id.to_string()))?;
        Ok(merge_device(&mut user.device_tokens, registration, true))
    }

    async fn remove_device(&self, user_id: &str, device_id: Uuid) -> Result<bool, UserDirectoryError> {
        let Some(mut user) = self.users.get_mut(user_id) else {
            return Ok(false);
        };
        let before = user.device_tokens.len();
        user.device_tokens.retain(|d| d.id != device_id);
        Ok(user.device_tokens.len() != before)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
