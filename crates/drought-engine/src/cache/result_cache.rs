//! In-memory LRU cache for finished query results.
//!
//! Keys are full query tuples, so two panels asking different questions
//! hold separate entries instead of evicting each other. The capacity is
//! sized for the number of panels that query concurrently.

use lru::LruCache;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::types::CacheStats;

struct Inner<K: Hash + Eq, V> {
    cache: LruCache<K, Arc<V>>,
    stats: CacheStats,
}

/// Mutex-guarded LRU of query results; least recently used is evicted first.
pub struct ResultCache<K: Hash + Eq, V> {
    inner: Mutex<Inner<K, V>>,
    capacity: usize,
}

impl<K: Hash + Eq + Clone, V> ResultCache<K, V> {
    /// Create a cache holding at most `capacity` results (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let cache_size = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            inner: Mutex::new(Inner {
                cache: LruCache::new(cache_size),
                stats: CacheStats::default(),
            }),
            capacity,
        }
    }

    /// Get a cached result, promoting it to most recently used.
    pub async fn get(&self, key: &K) -> Option<Arc<V>> {
        let mut inner = self.inner.lock().await;
        match inner.cache.get(key).cloned() {
            Some(value) => {
                inner.stats.hits += 1;
                Some(value)
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// Insert a result, evicting the least recently used one when full.
    pub async fn insert(&self, key: K, value: Arc<V>) {
        let mut inner = self.inner.lock().await;
        if let Some((evicted_key, _)) = inner.cache.push(key.clone(), value) {
            if evicted_key != key {
                inner.stats.evictions += 1;
                tracing::debug!(capacity = self.capacity, "Evicted least recently used query result");
            }
        }
        inner.stats.entries = inner.cache.len();
    }

    /// Return the cached result for `key`, computing and caching it on a miss.
    ///
    /// The lock is not held while `compute` runs; a concurrent miss on the
    /// same key computes twice and the later insert wins.
    pub async fn get_or_try_insert_with<F, Fut>(&self, key: K, compute: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(hit) = self.get(&key).await {
            return Ok(hit);
        }

        let value = Arc::new(compute().await?);
        self.insert(key, Arc::clone(&value)).await;
        Ok(value)
    }

    pub async fn contains(&self, key: &K) -> bool {
        self.inner.lock().await.cache.contains(key)
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().await;
        CacheStats {
            entries: inner.cache.len(),
            ..inner.stats
        }
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.cache.clear();
        inner.stats.entries = 0;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[tokio::test]
    async fn test_get_and_insert() {
        let cache: ResultCache<String, u32> = ResultCache::new(2);
        assert!(cache.get(&"a".to_string()).await.is_none());

        cache.insert("a".to_string(), Arc::new(1)).await;
        assert_eq!(cache.get(&"a".to_string()).await.as_deref(), Some(&1));

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_two_panels_do_not_thrash() {
        let cache: ResultCache<&'static str, u32> = ResultCache::new(2);
        cache.insert("left", Arc::new(1)).await;
        cache.insert("right", Arc::new(2)).await;

        // alternating panel requests keep hitting
        for _ in 0..3 {
            assert!(cache.get(&"left").await.is_some());
            assert!(cache.get(&"right").await.is_some());
        }
        assert_eq!(cache.stats().await.evictions, 0);
    }

    #[tokio::test]
    async fn test_evicts_least_recently_used() {
        let cache: ResultCache<&'static str, u32> = ResultCache::new(2);
        cache.insert("a", Arc::new(1)).await;
        cache.insert("b", Arc::new(2)).await;
        cache.get(&"a").await;
        cache.insert("c", Arc::new(3)).await;

        assert!(cache.contains(&"a").await);
        assert!(!cache.contains(&"b").await);
        assert!(cache.contains(&"c").await);
        assert_eq!(cache.stats().await.evictions, 1);
    }

    #[tokio::test]
    async fn test_get_or_try_insert_with_computes_once() {
        let cache: ResultCache<u8, u32> = ResultCache::new(2);
        let first = cache.get_or_try_insert_with(1, || async { Ok(10) }).await.unwrap();
        let second = cache
            .get_or_try_insert_with(1, || async { Err(EngineError::Config("not called".into())) })
            .await
            .unwrap();
        assert_eq!(*first, 10);
        assert_eq!(*second, 10);
    }

    #[tokio::test]
    async fn test_failed_compute_is_not_cached() {
        let cache: ResultCache<u8, u32> = ResultCache::new(2);
        let result = cache
            .get_or_try_insert_with(1, || async { Err(EngineError::Config("boom".into())) })
            .await;
        assert!(result.is_err());
        assert!(!cache.contains(&1).await);
    }

    #[test]
    fn test_clear_keeps_counters() {
        let cache: ResultCache<u8, u32> = ResultCache::new(1);
        tokio_test::block_on(async {
            cache.insert(1, Arc::new(1)).await;
            cache.get(&1).await;
            cache.clear().await;

            let stats = cache.stats().await;
            assert_eq!(stats.entries, 0);
            assert_eq!(stats.hits, 1);
            assert!(cache.get(&1).await.is_none());
        });
    }
}
