//! Cache provider configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache provider type: `"memory"` or `"redis"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// TTL for listing responses, which change often.
    #[serde(default = "default_listing_ttl")]
    pub listing_ttl_seconds: u64,
    /// TTL for detail responses of immutable or rarely changing records.
    #[serde(default = "default_detail_ttl")]
    pub detail_ttl_seconds: u64,
    /// Redis-specific cache configuration.
    #[serde(default)]
    pub redis: RedisCacheConfig,
    /// In-memory cache configuration.
    #[serde(default)]
    pub memory: MemoryCacheConfig,
}

impl CacheConfig {
    /// Listing TTL as a [`Duration`].
    pub fn listing_ttl(&self) -> Duration {
        Duration::from_secs(self.listing_ttl_seconds)
    }

    /// Detail TTL as a [`Duration`].
    pub fn detail_ttl(&self) -> Duration {
        Duration::from_secs(self.detail_ttl_seconds)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            listing_ttl_seconds: default_listing_ttl(),
            detail_ttl_seconds: default_detail_ttl(),
            redis: RedisCacheConfig::default(),
            memory: MemoryCacheConfig::default(),
        }
    }
}

/// Redis cache backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisCacheConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Key prefix for all analyzer cache keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// In-memory cache backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// Maximum number of entries in the cache.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_listing_ttl() -> u64 {
    60
}

fn default_detail_ttl() -> u64 {
    3600
}

fn default_redis_url() -> String {
    "redis://localhost:6379/0".to_string()
}

fn default_key_prefix() -> String {
    "analyzer:".to_string()
}

fn default_max_capacity() -> u64 {
    10000
}
