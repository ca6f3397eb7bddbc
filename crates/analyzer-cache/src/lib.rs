//! # analyzer-cache
//!
//! Cache provider implementations and the read-through layer in front of
//! the document and analysis read paths. Supports two providers:
//!
//! - **memory**: In-process cache using [moka](https://crates.io/crates/moka)
//! - **redis**: Redis-backed cache using the [redis](https://crates.io/crates/redis) crate
//!
//! The provider is selected at runtime based on configuration. The cache is
//! an optimization only: every failure degrades to a direct read.

pub mod invalidation;
pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
pub mod read_through;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use invalidation::CacheInvalidator;
pub use provider::CacheManager;
pub use read_through::{ReadThroughCache, TtlClass};
