//! # LRU Cache
//!
//! Small least-recently-used cache for classified layers. The engine keys
//! it by baseline and source filter, so it never holds more than a handful
//! of entries and a linear recency list is enough.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Least-recently-used cache with hit/miss counters.
#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    entries: HashMap<K, V>,
    /// Keys from least to most recently used
    recency: VecDeque<K>,
    hits: u64,
    misses: u64,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    /// Create a cache holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            recency: VecDeque::with_capacity(capacity),
            hits: 0,
            misses: 0,
        }
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            if let Some(k) = self.recency.remove(pos) {
                self.recency.push_back(k);
            }
        }
    }

    /// Look up a value and mark it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.entries.contains_key(key) {
            self.hits += 1;
            self.touch(key);
            self.entries.get(key)
        } else {
            self.misses += 1;
            None
        }
    }

    /// Insert or replace a value. Returns the evicted entry, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.entries.contains_key(&key) {
            self.touch(&key);
            self.entries.insert(key, value);
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.recency
                .pop_front()
                .and_then(|old| self.entries.remove(&old).map(|v| (old, v)))
        } else {
            None
        };

        self.recency.push_back(key.clone());
        self.entries.insert(key, value);
        evicted
    }

    /// Return the cached value for `key`, computing and caching it on a miss.
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, compute: F) -> &V {
        if self.entries.contains_key(&key) {
            self.hits += 1;
            self.touch(&key);
        } else {
            self.misses += 1;
            self.insert(key.clone(), compute());
        }
        &self.entries[&key]
    }

    pub fn invalidate(&mut self, key: &K) -> Option<V> {
        self.recency.retain(|k| k != key);
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// `(hits, misses)` since creation.
    pub fn hit_stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

impl<K: Eq + Hash + Clone, V> Default for LruCache<K, V> {
    fn default() -> Self {
        Self::new(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction_order() {
        let mut cache: LruCache<&str, i32> = LruCache::new(2);
        assert!(cache.insert("today", 1).is_none());
        assert!(cache.insert("tomorrow", 2).is_none());

        // Touch "today" so "tomorrow" becomes the oldest
        assert_eq!(cache.get(&"today"), Some(&1));
        assert_eq!(cache.insert("alerts", 3), Some(("tomorrow", 2)));

        assert!(cache.contains(&"today"));
        assert!(cache.contains(&"alerts"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_replace_does_not_grow() {
        let mut cache: LruCache<&str, i32> = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("a", 10);
        assert_eq!(cache.get(&"a"), Some(&10));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_or_insert_with_counts() {
        let mut cache: LruCache<u8, String> = LruCache::new(4);
        let mut computed = 0;
        for _ in 0..3 {
            cache.get_or_insert_with(1, || {
                computed += 1;
                "layer".to_string()
            });
        }
        assert_eq!(computed, 1);
        assert_eq!(cache.hit_stats(), (2, 1));
    }

    #[test]
    fn test_invalidate() {
        let mut cache: LruCache<(u8, u8), i32> = LruCache::new(2);
        cache.insert((0, 1), 1);
        cache.insert((1, 1), 3);

        assert_eq!(cache.invalidate(&(0, 1)), Some(1));
        assert_eq!(cache.invalidate(&(0, 1)), None);
        assert_eq!(cache.len(), 1);

        // An invalidated key must not be evicted a second time
        cache.insert((2, 0), 4);
        assert_eq!(cache.insert((3, 0), 5), Some(((1, 1), 3)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut cache: LruCache<u8, u8> = LruCache::new(0);
        cache.insert(1, 1);
        cache.insert(2, 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&2));
        cache.clear();
        assert!(cache.is_empty());
    }
}
