//! User directory: recipient profiles and their push devices.
//!
//! Delivery jobs and the recovery sweep resolve recipients here at send time,
//! so the directory must outlive the process whenever the delivery log does.
//! Use `create_user_directory()` to pick the backend from configuration.

pub mod backend;
mod factory;
pub mod memory_backend;
pub mod postgres_backend;

pub use backend::{DeviceRegistration, UserDirectory, UserDirectoryError};
pub use factory::create_user_directory;
pub use memory_backend::MemoryUserDirectory;
pub use postgres_backend::PostgresUserDirectory;
