//! In-app inbox written by the `database` channel and read by the user
//! notification endpoints.

pub mod backend;
mod factory;
pub mod memory_backend;
pub mod postgres_backend;

pub use backend::{InAppNotification, InboxBackend, InboxError, InboxPage};
pub use factory::create_inbox_backend;
pub use memory_backend::MemoryInboxBackend;
pub use postgres_backend::PostgresInboxBackend;
