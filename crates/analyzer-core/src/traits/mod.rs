//! Core traits defined in `analyzer-core` and implemented by other crates.

pub mod cache;
pub mod queue;
pub mod storage;

pub use cache::CacheProvider;
pub use queue::{Delivery, QueueDepth, WorkQueue};
pub use storage::StorageProvider;
