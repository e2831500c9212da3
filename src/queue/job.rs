//! Delivery job model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notification::NotificationPayload;

/// One unit of work: deliver `payload` to `user_id` through `channel_id`,
/// tracked by the log row `log_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryJob {
    pub id: Uuid,
    pub log_id: Uuid,
    pub user_id: String,
    pub channel_id: String,
    pub payload: NotificationPayload,
    /// 1-based attempt number.
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl DeliveryJob {
    pub fn new(log_id: Uuid, user_id: &str, channel_id: &str, payload: NotificationPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            log_id,
            user_id: user_id.to_string(),
            channel_id: channel_id.to_string(),
            payload,
            attempt: 1,
            enqueued_at: Utc::now(),
        }
    }

    /// The same delivery, one attempt later. Keeps the job id.
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            enqueued_at: Utc::now(),
            ..self.clone()
        }
    }
}
