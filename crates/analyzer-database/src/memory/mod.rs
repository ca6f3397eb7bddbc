//! In-process store implementations.
//!
//! Used by tests and by single-process development setups
//! (`database.provider = "memory"`). They honour the same lease and
//! compare-and-set rules as the PostgreSQL repositories.

pub mod document;
pub mod job;

pub use document::MemoryDocumentStore;
pub use job::MemoryJobStore;

use std::time::Duration;

use analyzer_core::error::AppError;
use analyzer_core::result::AppResult;

fn to_chrono(ttl: Duration) -> AppResult<chrono::Duration> {
    chrono::Duration::from_std(ttl)
        .map_err(|e| AppError::internal(format!("Lease duration out of range: {e}")))
}
