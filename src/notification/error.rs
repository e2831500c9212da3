use thiserror::Error;

use crate::delivery_log::DeliveryLogError;
use crate::directory::UserDirectoryError;
use crate::preference::PreferenceBackendError;
use crate::queue::QueueError;

/// Error taxonomy of the dispatch and delivery engine.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// No channel is registered under the id. Never retried.
    #[error("Notification channel [{0}] is not registered.")]
    ChannelNotRegistered(String),

    /// Preference update referenced a channel slug that does not exist.
    #[error("Unknown notification channel: {0}")]
    UnknownChannel(String),

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    /// A channel send failed before the retry budget ran out.
    #[error("Delivery via {channel} failed on attempt {attempt}: {message}")]
    TransientDelivery {
        channel: String,
        attempt: u32,
        message: String,
    },

    /// Retries exhausted or the row cannot be recovered.
    #[error("Delivery via {channel} failed permanently: {message}")]
    TerminalDelivery { channel: String, message: String },

    #[error("Delivery log error: {0}")]
    DeliveryLog(#[from] DeliveryLogError),

    #[error("User directory error: {0}")]
    Directory(#[from] UserDirectoryError),

    #[error("Preference store error: {0}")]
    Preference(#[from] PreferenceBackendError),

    #[error("Job queue error: {0}")]
    Queue(#[from] QueueError),
}
