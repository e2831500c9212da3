//! Delivery log data models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notification::{EventType, NotificationPayload};

/// Status of one per-channel delivery.
///
/// Only `Pending -> Sent` and `Pending -> Failed` are valid transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            other => Err(format!("unknown delivery status: {}", other)),
        }
    }
}

/// Audit record of one attempted per-channel delivery.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryLogEntry {
    pub id: Uuid,
    pub user_id: String,
    pub channel_id: String,
    pub event_type: EventType,
    /// Payload variant identifier, e.g. `login_from_new_ip`.
    pub payload_kind: String,
    /// Full serialized payload, used to rebuild the notification on recovery.
    pub payload: serde_json::Value,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryLogEntry {
    /// New `pending` entry for delivering `payload` through `channel_id`.
    pub fn pending(
        user_id: &str,
        channel_id: &str,
        payload: &NotificationPayload,
    ) -> Result<Self, serde_json::Error> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            channel_id: channel_id.to_string(),
            event_type: payload.event_type(),
            payload_kind: payload.kind().to_string(),
            payload: serde_json::to_value(payload)?,
            status: DeliveryStatus::Pending,
            error_message: None,
            sent_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn decode_payload(&self) -> Result<NotificationPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Listing filter for a user's delivery history, newest first.
#[derive(Debug, Clone, Deserialize)]
pub struct LogQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub status: Option<DeliveryStatus>,
}

fn default_limit() -> usize {
    15
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
            status: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryLogStats {
    pub backend_type: String,
    pub pending: u64,
    pub sent: u64,
    pub failed: u64,
}
