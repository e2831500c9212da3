//! Notification domain types: event types, payloads, renderings, recipients,
//! and the engine's error taxonomy.

mod error;
pub mod render;
mod types;
pub mod user;

pub use error::NotifyError;
pub use render::{AppInfo, DatabaseRecord, MailMessage, PushMessage, Rendered};
pub use types::{EventType, NotificationPayload};
pub use user::{DevicePlatform, DeviceToken, User};
