//! Read-through cache in front of the document and analysis read paths.
//!
//! On a miss the loader runs against the source of truth and its value is
//! stored with the TTL of its class. Cache failures never fail a read:
//! a broken `get` falls through to the loader, a broken `set` is logged.
//! Loader errors are returned as-is and never cached.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use analyzer_core::config::cache::CacheConfig;
use analyzer_core::result::AppResult;
use analyzer_core::traits::cache::CacheProvider;
use analyzer_core::types::UserId;

use crate::keys;

/// TTL class of a cached read model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    /// Listings change whenever documents or analyses come and go.
    Listing,
    /// Detail views of records that rarely or never change.
    Detail,
}

/// Read-through cache over a [`CacheProvider`].
#[derive(Debug, Clone)]
pub struct ReadThroughCache {
    provider: Arc<dyn CacheProvider>,
    listing_ttl: Duration,
    detail_ttl: Duration,
}

impl ReadThroughCache {
    /// Create a read-through cache with TTLs from configuration.
    pub fn new(provider: Arc<dyn CacheProvider>, config: &CacheConfig) -> Self {
        Self::with_ttls(provider, config.listing_ttl(), config.detail_ttl())
    }

    /// Create a read-through cache with explicit TTLs.
    pub fn with_ttls(
        provider: Arc<dyn CacheProvider>,
        listing_ttl: Duration,
        detail_ttl: Duration,
    ) -> Self {
        Self {
            provider,
            listing_ttl,
            detail_ttl,
        }
    }

    /// The underlying provider.
    pub fn provider(&self) -> &Arc<dyn CacheProvider> {
        &self.provider
    }

    /// TTL applied to entries of the given class.
    pub fn ttl(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Listing => self.listing_ttl,
            TtlClass::Detail => self.detail_ttl,
        }
    }

    /// Return the cached value for `key`, or load, store and return it.
    pub async fn get_or_load<T, F, Fut>(&self, key: &str, class: TtlClass, loader: F) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = AppResult<T>> + Send,
    {
        match self.provider.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    debug!(key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(key, error = %e, "Discarding undecodable cache entry");
                    if let Err(e) = self.provider.delete(key).await {
                        warn!(key, error = %e, "Failed to delete undecodable cache entry");
                    }
                }
            },
            Ok(None) => debug!(key, "Cache miss"),
            Err(e) => warn!(key, error = %e, "Cache read failed, reading from source"),
        }

        let value = loader().await?;
        self.store(key, &value, class).await;
        Ok(value)
    }

    /// Epoch-scoped variant: the key is built from the owner's current
    /// scope epoch. A value loaded while an invalidation bumps the epoch is
    /// written under the old epoch and never read again. When the epoch
    /// cannot be read the cache is bypassed entirely.
    pub async fn get_or_load_scoped<T, K, F, Fut>(
        &self,
        owner: UserId,
        class: TtlClass,
        key_for_epoch: K,
        loader: F,
    ) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned + Send,
        K: FnOnce(i64) -> String + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = AppResult<T>> + Send,
    {
        match self.scope_epoch(owner).await {
            Some(epoch) => {
                let key = key_for_epoch(epoch);
                self.get_or_load(&key, class, loader).await
            }
            None => loader().await,
        }
    }

    /// [`Self::get_or_load_scoped`] with the listing TTL.
    pub async fn get_or_load_listing<T, K, F, Fut>(
        &self,
        owner: UserId,
        key_for_epoch: K,
        loader: F,
    ) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned + Send,
        K: FnOnce(i64) -> String + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = AppResult<T>> + Send,
    {
        self.get_or_load_scoped(owner, TtlClass::Listing, key_for_epoch, loader)
            .await
    }

    /// Current scope epoch of an owner; `None` when the cache is down.
    pub async fn scope_epoch(&self, owner: UserId) -> Option<i64> {
        let key = keys::scope_epoch(owner);
        match self.provider.get(&key).await {
            Ok(Some(raw)) => match raw.parse::<i64>() {
                Ok(epoch) => Some(epoch),
                Err(_) => {
                    warn!(key = %key, "Scope epoch is not an integer, bypassing cache");
                    None
                }
            },
            Ok(None) => Some(0),
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, bypassing scoped cache");
                None
            }
        }
    }

    /// Orphan every scoped entry cached for `owner` before this call.
    pub async fn bump_scope_epoch(&self, owner: UserId) -> AppResult<i64> {
        self.provider.incr(&keys::scope_epoch(owner)).await
    }

    /// Remove every key matching a glob pattern.
    pub async fn invalidate(&self, pattern: &str) -> AppResult<u64> {
        self.provider.delete_pattern(pattern).await
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T, class: TtlClass) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize value for cache");
                return;
            }
        };
        if let Err(e) = self.provider.set(key, &raw, self.ttl(class)).await {
            warn!(key, error = %e, "Cache write failed, serving uncached value");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use analyzer_core::config::cache::MemoryCacheConfig;
    use analyzer_core::error::AppError;

    use super::*;
    use crate::memory::MemoryCacheProvider;

    /// A provider whose every call fails, as if the broker were down.
    #[derive(Debug)]
    pub(crate) struct DownCache;

    #[async_trait]
    impl CacheProvider for DownCache {
        async fn get(&self, _key: &str) -> AppResult<Option<String>> {
            Err(AppError::cache("connection refused"))
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> AppResult<()> {
            Err(AppError::cache("connection refused"))
        }
        async fn delete(&self, _key: &str) -> AppResult<()> {
            Err(AppError::cache("connection refused"))
        }
        async fn exists(&self, _key: &str) -> AppResult<bool> {
            Err(AppError::cache("connection refused"))
        }
        async fn delete_pattern(&self, _pattern: &str) -> AppResult<u64> {
            Err(AppError::cache("connection refused"))
        }
        async fn incr(&self, _key: &str) -> AppResult<i64> {
            Err(AppError::cache("connection refused"))
        }
        async fn expire(&self, _key: &str, _ttl: Duration) -> AppResult<bool> {
            Err(AppError::cache("connection refused"))
        }
        async fn health_check(&self) -> AppResult<bool> {
            Ok(false)
        }
    }

    fn memory_cache() -> ReadThroughCache {
        let provider = Arc::new(MemoryCacheProvider::new(&MemoryCacheConfig { max_capacity: 100 }));
        ReadThroughCache::with_ttls(provider, Duration::from_secs(60), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let cache = memory_cache();
        let loads = AtomicUsize::new(0);
        for _ in 0..2 {
            let value: Vec<String> = cache
                .get_or_load("docs:get:k", TtlClass::Detail, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["report.pdf".to_string()])
                })
                .await
                .unwrap();
            assert_eq!(value, vec!["report.pdf".to_string()]);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loader_error_is_not_cached() {
        let cache = memory_cache();
        let first: AppResult<String> = cache
            .get_or_load("k", TtlClass::Detail, || async {
                Err(AppError::not_found("Document not found"))
            })
            .await;
        assert!(first.is_err());
        let second: String = cache
            .get_or_load("k", TtlClass::Detail, || async { Ok("loaded".to_string()) })
            .await
            .unwrap();
        assert_eq!(second, "loaded");
    }

    #[tokio::test]
    async fn test_unavailable_cache_degrades_to_source() {
        let cache = ReadThroughCache::with_ttls(
            Arc::new(DownCache),
            Duration::from_secs(60),
            Duration::from_secs(3600),
        );
        let value: u32 = cache
            .get_or_load("k", TtlClass::Listing, || async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let owner = UserId::new();
        assert_eq!(cache.scope_epoch(owner).await, None);
        let listed: Vec<u32> = cache
            .get_or_load_listing(owner, |e| format!("l:{e}"), || async { Ok(vec![1, 2]) })
            .await
            .unwrap();
        assert_eq!(listed, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_epoch_bump_orphans_cached_listing() {
        let cache = memory_cache();
        let owner = UserId::new();
        let stale: Vec<u32> = cache
            .get_or_load_listing(owner, |e| format!("l:{e}"), || async { Ok(vec![1, 2]) })
            .await
            .unwrap();
        assert_eq!(stale, vec![1, 2]);

        assert_eq!(cache.bump_scope_epoch(owner).await.unwrap(), 1);
        let fresh: Vec<u32> = cache
            .get_or_load_listing(owner, |e| format!("l:{e}"), || async { Ok(vec![1]) })
            .await
            .unwrap();
        assert_eq!(fresh, vec![1]);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_replaced() {
        let cache = memory_cache();
        cache
            .provider()
            .set("k", "not json", Duration::from_secs(60))
            .await
            .unwrap();
        let value: u32 = cache
            .get_or_load("k", TtlClass::Detail, || async { Ok(3) })
            .await
            .unwrap();
        assert_eq!(value, 3);
        assert_eq!(cache.provider().get("k").await.unwrap(), Some("3".to_string()));
    }

    #[tokio::test]
    async fn test_scoped_detail_uses_its_own_ttl_class() {
        let cache = ReadThroughCache::with_ttls(
            Arc::new(MemoryCacheProvider::new(&MemoryCacheConfig { max_capacity: 100 })),
            Duration::from_secs(60),
            Duration::from_secs(3600),
        );
        let owner = UserId::new();
        let loads = AtomicUsize::new(0);
        for _ in 0..2 {
            let value: u32 = cache
                .get_or_load_scoped(owner, TtlClass::Detail, |e| format!("d:{e}"), || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(9)
                })
                .await
                .unwrap();
            assert_eq!(value, 9);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(cache.provider().exists("d:0").await.unwrap());
    }
}
