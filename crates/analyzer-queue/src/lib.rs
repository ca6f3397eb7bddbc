//! Work queue backends for analysis jobs.
//!
//! A queue item is just a job id; the job record is the source of truth
//! for everything else. Delivery is at-least-once: an item handed to a
//! worker stays invisible for a visibility timeout and returns to the
//! head of the queue if it is not acknowledged in time.

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "redis-backend")]
pub mod redis;
pub mod receipt;

use std::sync::Arc;

use tracing::info;

use analyzer_core::config::queue::QueueConfig;
use analyzer_core::error::AppError;
use analyzer_core::result::AppResult;
use analyzer_core::traits::WorkQueue;

#[cfg(feature = "memory")]
pub use memory::MemoryWorkQueue;
#[cfg(feature = "redis-backend")]
pub use self::redis::RedisWorkQueue;

/// Build the configured work queue backend.
pub async fn connect(config: &QueueConfig) -> AppResult<Arc<dyn WorkQueue>> {
    match config.provider.as_str() {
        #[cfg(feature = "redis-backend")]
        "redis" => {
            let queue = RedisWorkQueue::connect(&config.redis_url, &config.name).await?;
            info!(queue = %config.name, "Using Redis work queue");
            Ok(Arc::new(queue))
        }
        #[cfg(feature = "memory")]
        "memory" => {
            info!(queue = %config.name, "Using in-memory work queue");
            Ok(Arc::new(MemoryWorkQueue::new()))
        }
        other => Err(AppError::configuration(format!(
            "Unsupported queue provider: '{other}'"
        ))),
    }
}
