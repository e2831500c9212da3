//! Security event intake: maps account events to notification payloads and
//! hands them to the dispatcher.

mod handler;
mod login_history;

pub use handler::{LoginOutcome, SecurityEvent, SecurityEventHandler};
pub use login_history::{LoginHistory, LoginRecord};
