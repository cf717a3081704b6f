//! LRU cache for decoded time chunks of archive cubes.

use lru::LruCache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::CacheStats;

/// Cache key for chunks: (cube path hash, time-chunk index).
pub type ChunkKey = (u64, usize);

/// A decoded chunk: `steps * rows * cols` values, fill already translated to NaN.
pub type ChunkData = Arc<[f32]>;

/// LRU cache for decoded chunks with memory-bounded eviction.
///
/// Entries are only bounded by their byte size; a single chunk larger than
/// the whole budget is never cached.
pub struct ChunkCache {
    cache: LruCache<ChunkKey, ChunkData>,
    memory_limit: usize,
    current_memory: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ChunkCache {
    /// Create a new chunk cache with the given memory limit in bytes.
    pub fn new(memory_limit: usize) -> Self {
        Self {
            cache: LruCache::unbounded(),
            memory_limit,
            current_memory: 0,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up a chunk, promoting it to most recently used.
    pub fn get(&mut self, key: &ChunkKey) -> Option<ChunkData> {
        if let Some(data) = self.cache.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(Arc::clone(data))
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Check if a key exists in the cache without updating LRU order.
    pub fn contains(&self, key: &ChunkKey) -> bool {
        self.cache.contains(key)
    }

    /// Insert a chunk, evicting least recently used entries to make room.
    pub fn insert(&mut self, key: ChunkKey, data: ChunkData) {
        let data_size = byte_size(&data);
        if data_size > self.memory_limit {
            return;
        }

        if let Some(previous) = self.cache.pop(&key) {
            self.current_memory = self.current_memory.saturating_sub(byte_size(&previous));
        }

        while self.current_memory + data_size > self.memory_limit {
            match self.cache.pop_lru() {
                Some((_, evicted)) => {
                    self.current_memory = self.current_memory.saturating_sub(byte_size(&evicted));
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                None => break,
            }
        }

        self.cache.put(key, data);
        self.current_memory += data_size;
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
            memory_bytes: self.current_memory as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Clear all entries from the cache.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.current_memory = 0;
    }

    /// Get the current memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        self.current_memory
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

fn byte_size(data: &[f32]) -> usize {
    data.len() * std::mem::size_of::<f32>()
}

/// Hash of a cube path, used as part of the cache key to distinguish
/// chunks from different cubes.
pub fn hash_path(path: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(value: f32, len: usize) -> ChunkData {
        vec![value; len].into()
    }

    #[test]
    fn test_cache_insert_and_get() {
        let mut cache = ChunkCache::new(1024 * 1024);
        let key = (123, 0);

        assert!(cache.get(&key).is_none());
        cache.insert(key, chunk(1.5, 4));
        assert_eq!(cache.get(&key).as_deref(), Some(&[1.5f32; 4][..]));
    }

    #[test]
    fn test_cache_lru_eviction() {
        // 64 bytes = 16 f32s
        let mut cache = ChunkCache::new(64);

        for i in 0..10 {
            cache.insert((0, i), chunk(i as f32, 4));
        }

        assert!(cache.get(&(0, 0)).is_none());
        assert!(cache.get(&(0, 9)).is_some());
        assert_eq!(cache.len(), 4);
        assert!(cache.stats().evictions > 0);
    }

    #[test]
    fn test_recently_used_survives_eviction() {
        let mut cache = ChunkCache::new(32);
        cache.insert((0, 0), chunk(0.0, 4));
        cache.insert((0, 1), chunk(1.0, 4));

        // touch 0 so 1 becomes the eviction candidate
        assert!(cache.get(&(0, 0)).is_some());
        cache.insert((0, 2), chunk(2.0, 4));

        assert!(cache.contains(&(0, 0)));
        assert!(!cache.contains(&(0, 1)));
        assert!(cache.contains(&(0, 2)));
    }

    #[test]
    fn test_oversized_chunk_not_cached() {
        let mut cache = ChunkCache::new(16);
        cache.insert((0, 0), chunk(0.0, 100));
        assert!(cache.is_empty());
        assert_eq!(cache.memory_usage(), 0);
    }

    #[test]
    fn test_reinsert_does_not_double_count() {
        let mut cache = ChunkCache::new(1024);
        cache.insert((0, 0), chunk(0.0, 8));
        cache.insert((0, 0), chunk(1.0, 8));
        assert_eq!(cache.memory_usage(), 32);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_stats() {
        let mut cache = ChunkCache::new(1024 * 1024);
        cache.insert((0, 0), chunk(1.0, 4));

        cache.get(&(0, 0));
        cache.get(&(0, 1));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.memory_bytes, 16);
    }

    #[test]
    fn test_cache_clear() {
        let mut cache = ChunkCache::new(1024 * 1024);
        cache.insert((0, 0), chunk(1.0, 4));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.memory_usage(), 0);
    }

    #[test]
    fn test_hash_path() {
        let hash1 = hash_path("archive/raw/spei3.zarr");
        let hash2 = hash_path("archive/raw/spei3.zarr");
        let hash3 = hash_path("archive/percentile/spei3.zarr");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
    }
}
