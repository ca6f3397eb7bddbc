//! Key/value cache seam used by the read-through layer and the rate limiter.

use std::time::Duration;

use async_trait::async_trait;

use crate::result::AppResult;

/// A string-valued cache with per-entry expiry.
///
/// Payloads are opaque strings; callers serialize before writing. An entry
/// is never returned once its TTL has elapsed. Errors mean the backend is
/// unreachable, and callers are expected to fall back to the source of
/// truth rather than fail.
#[async_trait]
pub trait CacheProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Read a live entry.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Write an entry that expires after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()>;

    /// Remove an entry. Missing keys are not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// Remove every key matching a glob (`*` and `?`), returning how many went.
    async fn delete_pattern(&self, pattern: &str) -> AppResult<u64>;

    /// Atomically add one to a counter, creating it at 1.
    ///
    /// A counter created here has no TTL until [`CacheProvider::expire`] is
    /// called; fixed-window limiters set it on the first hit.
    async fn incr(&self, key: &str) -> AppResult<i64>;

    /// Put a TTL on an existing key. `false` when the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool>;

    /// Whether the backend answers.
    async fn health_check(&self) -> AppResult<bool>;
}
