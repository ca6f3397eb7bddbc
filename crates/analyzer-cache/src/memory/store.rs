//! In-memory cache implementation using the moka crate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use moka::Expiry;
use moka::future::Cache;
use tracing::debug;

use analyzer_core::config::cache::MemoryCacheConfig;
use analyzer_core::result::AppResult;
use analyzer_core::traits::cache::CacheProvider;

/// A cached value together with the TTL it was written with.
#[derive(Debug, Clone)]
struct Entry {
    value: Arc<str>,
    ttl: Duration,
}

/// Expires each entry after its own TTL, measured from its last write.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// A counter used by fixed-window rate limiting.
#[derive(Debug, Clone, Copy)]
struct Counter {
    value: i64,
    expires_at: Option<Instant>,
}

impl Counter {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-memory cache provider using moka.
///
/// Counters live in a separate map so `incr` is atomic per key; they are
/// visible through `get` like any other value.
#[derive(Debug, Clone)]
pub struct MemoryCacheProvider {
    cache: Cache<String, Entry>,
    counters: Arc<DashMap<String, Counter>>,
}

impl MemoryCacheProvider {
    /// Create a new in-memory cache from configuration.
    pub fn new(config: &MemoryCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self {
            cache,
            counters: Arc::new(DashMap::new()),
        }
    }

    fn live_counter(&self, key: &str) -> Option<i64> {
        let now = Instant::now();
        let counter = *self.counters.get(key)?;
        if counter.is_live(now) {
            Some(counter.value)
        } else {
            self.counters.remove_if(key, |_, c| !c.is_live(now));
            None
        }
    }
}

/// Glob match supporting `*` (any run of characters) and `?` (one character).
pub(crate) fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();
    let (mut p, mut k) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, k));
                p += 1;
            }
            Some(&c) if c == '?' || c == key[k] => {
                p += 1;
                k += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    k = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        if let Some(entry) = self.cache.get(key).await {
            return Ok(Some(entry.value.to_string()));
        }
        Ok(self.live_counter(key).map(|value| value.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.cache
            .insert(
                key.to_string(),
                Entry {
                    value: Arc::from(value),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.cache.remove(key).await;
        self.counters.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.cache.contains_key(key) || self.live_counter(key).is_some())
    }

    async fn delete_pattern(&self, pattern: &str) -> AppResult<u64> {
        let keys_to_remove: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, _)| key.to_string())
            .collect();

        let mut count = 0u64;
        for key in keys_to_remove {
            if self.cache.remove(&key).await.is_some() {
                count += 1;
            }
        }
        let before = self.counters.len();
        self.counters.retain(|key, _| !glob_match(pattern, key));
        count += (before - self.counters.len()) as u64;

        debug!(pattern, count, "Deleted keys matching pattern");
        Ok(count)
    }

    async fn incr(&self, key: &str) -> AppResult<i64> {
        let now = Instant::now();
        let mut counter = self.counters.entry(key.to_string()).or_insert(Counter {
            value: 0,
            expires_at: None,
        });
        if !counter.is_live(now) {
            *counter = Counter {
                value: 0,
                expires_at: None,
            };
        }
        counter.value += 1;
        Ok(counter.value)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool> {
        let now = Instant::now();
        if let Some(mut counter) = self.counters.get_mut(key) {
            if counter.is_live(now) {
                counter.expires_at = Some(now + ttl);
                return Ok(true);
            }
        }
        match self.cache.get(key).await {
            Some(entry) => {
                self.cache
                    .insert(key.to_string(), Entry { ttl, ..entry })
                    .await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
