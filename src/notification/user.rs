//! Recipient model.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePlatform {
    Android,
    Ios,
    Web,
}

impl DevicePlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            DevicePlatform::Android => "android",
            DevicePlatform::Ios => "ios",
            DevicePlatform::Web => "web",
        }
    }
}

impl FromStr for DevicePlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "android" => Ok(DevicePlatform::Android),
            "ios" => Ok(DevicePlatform::Ios),
            "web" => Ok(DevicePlatform::Web),
            other => Err(format!("unknown device platform: {}", other)),
        }
    }
}

/// Push registration for one device. A token is unique per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceToken {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub token: String,
    pub platform: DevicePlatform,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl DeviceToken {
    pub fn new(token: impl Into<String>, platform: DevicePlatform) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: token.into(),
            platform,
            device_name: None,
            is_active: true,
        }
    }
}

/// A notification recipient as seen by the delivery engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub device_tokens: Vec<DeviceToken>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            phone: None,
            device_tokens: Vec::new(),
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_device(mut self, token: impl Into<String>, platform: DevicePlatform) -> Self {
        self.device_tokens.push(DeviceToken::new(token, platform));
        self
    }

    /// Tokens that should receive push messages.
    pub fn active_device_tokens(&self) -> impl Iterator<Item = &str> {
        self.device_tokens
            .iter()
            .filter(|t| t.is_active)
            .map(|t| t.token.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_device_tokens_filters_inactive() {
        let mut user = User::new("u-1", "Ada", "ada@example.com")
            .with_device("tok-a", DevicePlatform::Android)
            .with_device("tok-b", DevicePlatform::Ios);
        user.device_tokens[1].is_active = false;

        let tokens: Vec<&str> = user.active_device_tokens().collect();
        assert_eq!(tokens, vec!["tok-a"]);
    }

    #[test]
    fn test_platform_parsing() {
        assert_eq!("ios".parse::<DevicePlatform>().unwrap(), DevicePlatform::Ios);
        assert_eq!(DevicePlatform::Web.as_str(), "web");
        assert!("blackberry".parse::<DevicePlatform>().is_err());
    }

    #[test]
    fn test_device_token_defaults_when_deserialized() {
        let token: DeviceToken =
            serde_json::from_str(r#"{"token":"abc","platform":"android"}"#).unwrap();
        assert!(token.is_active);
        assert!(token.device_name.is_none());
    }
}
