//! Caching layer for recently appended blocks
//!
//! Blocks are immutable once appended, so a cached entry never needs
//! invalidation; the cache only bounds memory via LRU eviction.
use crate::blockchain::Block;
use lru::LruCache;
use parking_lot::RwLock;
use std::hash::Hash;
use std::num::NonZeroUsize;

/// Generic, thread-safe LRU cache wrapper using RwLock.
pub struct ThreadSafeCache<K, V> {
    cache: RwLock<LruCache<K, V>>,
}

impl<K, V> ThreadSafeCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a new LRU cache with specified capacity. A capacity of 0 is mapped to 1.
    pub fn new_lru(capacity: usize) -> Self {
        let capacity_nz = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(capacity_nz)),
        }
    }

    /// Get a value from cache. Uses `peek` under a read lock, so lookups do not promote.
    pub fn get(&self, key: &K) -> Option<V> {
        self.cache.read().peek(key).cloned()
    }

    pub fn put(&self, key: K, value: V) {
        self.cache.write().put(key, value);
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.cache.read().cap().get()
    }
}

/// Cache for recent blocks, keyed by height
pub type BlockCache = ThreadSafeCache<u64, Block>;

impl BlockCache {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new(capacity: usize) -> Self {
        Self::new_lru(capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_at(height: u64) -> Block {
        let mut block = Block::new("proposer", vec![]);
        block.header.height = height;
        block
    }

    #[test]
    fn test_block_cache() {
        let cache = BlockCache::new(10);
        cache.put(1, block_at(1));

        let retrieved = cache.get(&1);
        assert!(retrieved.is_some());
        assert_eq!(cache.len(), 1);

        assert!(cache.get(&2).is_none());
        assert!(!cache.is_empty());
    }

    #[test]
    fn test_block_cache_lru_eviction() {
        let cache = BlockCache::new(5);
        for height in 0..5 {
            cache.put(height, block_at(height));
        }
        assert_eq!((cache.len(), cache.capacity()), (5, 5));

        cache.put(5, block_at(5));
        assert_eq!(cache.len(), 5);
        assert!(cache.get(&0).is_none());
        assert!(cache.get(&5).is_some());
    }

    #[test]
    fn test_zero_capacity_maps_to_one() {
        let cache = BlockCache::new(0);
        assert_eq!(cache.capacity(), 1);
    }
}
