//! Delivery job queue.
//!
//! The dispatcher enqueues one [`DeliveryJob`] per pending log row; workers
//! consume them and retries are re-enqueued with a delay.

mod backend;
mod job;
mod memory_backend;

pub use backend::{JobQueue, QueueError};
pub use job::DeliveryJob;
pub use memory_backend::{JobReceiver, MemoryJobQueue, QueueStats};
