//! Delivery channels.
//!
//! A channel turns a [`NotificationPayload`] into one concrete delivery
//! (in-app record, mail, SMS, push). Channels are registered once at startup in
//! a [`ChannelRegistry`] and shared read-only by the dispatcher, the delivery
//! workers, and the recovery sweep.
//!
//! # Built-in channels
//!
//! | Id | Type | Representation used |
//! |----|------|---------------------|
//! | `database` | [`InAppChannel`] | `Rendered::database` |
//! | `email` | [`EmailChannel`] | `Rendered::mail` |
//! | `sms` | [`SmsChannel`] | `Rendered::sms` |
//! | `firebase_push` | [`PushChannel`] | `Rendered::push` |

pub mod catalog;
mod database;
mod email;
pub mod registry;
mod push;
mod sms;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::inbox::InboxBackend;
use crate::notification::{AppInfo, EventType, NotificationPayload, User};

pub use catalog::{ChannelCatalog, ChannelDescriptor};
pub use database::InAppChannel;
pub use email::{EmailChannel, LogMailTransport, MailTransport};
pub use push::{LogPushTransport, PushChannel, PushTransport};
pub use registry::ChannelRegistry;
pub use sms::{LogSmsTransport, SmsChannel, SmsTransport};

pub const DATABASE_CHANNEL: &str = "database";
pub const EMAIL_CHANNEL: &str = "email";
pub const SMS_CHANNEL: &str = "sms";
pub const PUSH_CHANNEL: &str = "firebase_push";

/// Errors returned by a channel send. Any of them counts as a transient
/// delivery failure and is subject to the retry policy.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("recipient rejected: {0}")]
    Rejected(String),
}

/// A delivery capability.
///
/// `send` may be invoked more than once for the same notification (retries,
/// recovery sweep). Duplicate deliveries are accepted; implementations only
/// need to tolerate being called again after a failure.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Stable identifier, used as the registry key and in log rows.
    fn id(&self) -> &str;

    /// Whether this channel handles the given event type.
    fn supports(&self, _event_type: EventType) -> bool {
        true
    }

    /// Deliver the payload to the user.
    ///
    /// When the payload does not provide the representation this channel
    /// needs, the send is skipped and `Ok(())` is returned.
    async fn send(&self, user: &User, payload: &NotificationPayload) -> Result<(), ChannelError>;
}

/// Register the four built-in channels with logging transports.
pub fn register_builtin_channels(registry: &ChannelRegistry, inbox: Arc<dyn InboxBackend>, app: &AppInfo) {
    registry.register(DATABASE_CHANNEL, Arc::new(InAppChannel::new(inbox, app.clone())));
    registry.register(
        EMAIL_CHANNEL,
        Arc::new(EmailChannel::new(Arc::new(LogMailTransport), app.clone())),
    );
    registry.register(
        SMS_CHANNEL,
        Arc::new(SmsChannel::new(Arc::new(LogSmsTransport::default()), app.clone())),
    );
    registry.register(
        PUSH_CHANNEL,
        Arc::new(PushChannel::new(Arc::new(LogPushTransport), app.clone())),
    );
}
