//! Bounded least-recently-used cache.

use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

use bevy::platform::collections::HashMap;
use bevy::prelude::*;

use crate::error::CacheError;

/// Thread-safe, capacity-bounded cache with least-recently-used eviction.
///
/// A single mutex guards the whole structure. Capacities are tiny (a handful
/// of prepared maps), so contention between readers is not a concern.
///
/// Recency is tracked with a logical clock that ticks on every `get` and
/// `set`. No two entries share a timestamp, so the victim is always the
/// entry touched longest ago.
///
/// # Example
///
/// ```
/// use bevy_mapstream_core::cache::LruCache;
///
/// let cache = LruCache::new(2).unwrap();
/// cache.set("a", 1);
/// cache.set("b", 2);
/// cache.get(&"a");
/// cache.set("c", 3);
///
/// assert!(cache.contains_key(&"a"));
/// assert!(!cache.contains_key(&"b"));
/// ```
pub struct LruCache<K, V> {
    capacity: usize,
    state: Mutex<CacheState<K, V>>,
}

struct CacheState<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    clock: u64,
}

struct CacheEntry<V> {
    value: V,
    last_access: u64,
}

impl<K, V> CacheState<K, V> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries.
    ///
    /// Fails with [`CacheError::ZeroCapacity`] when `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        if capacity == 0 {
            return Err(CacheError::ZeroCapacity);
        }

        Ok(Self {
            capacity,
            state: Mutex::new(CacheState {
                entries: HashMap::default(),
                clock: 0,
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, CacheState<K, V>> {
        self.state.lock().unwrap_or_else(|poisoned| {
            error!("LruCache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Look up a value and mark it as most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut state = self.state();
        let now = state.tick();
        let entry = state.entries.get_mut(key)?;
        entry.last_access = now;
        Some(entry.value.clone())
    }

    /// Insert or replace a value.
    ///
    /// Inserting a new key into a full cache first evicts the least recently
    /// used entry, whose key is returned.
    pub fn set(&self, key: K, value: V) -> Option<K> {
        let mut state = self.state();
        let now = state.tick();

        if let Some(entry) = state.entries.get_mut(&key) {
            entry.value = value;
            entry.last_access = now;
            return None;
        }

        let mut evicted = None;
        if state.entries.len() >= self.capacity {
            let victim = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(key, _)| key.clone());
            if let Some(victim) = victim {
                state.entries.remove(&victim);
                evicted = Some(victim);
            }
        }

        state.entries.insert(
            key,
            CacheEntry {
                value,
                last_access: now,
            },
        );
        evicted
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.state().entries.remove(key).map(|entry| entry.value)
    }

    pub fn clear(&self) {
        self.state().entries.clear();
    }

    /// Whether `key` is cached. Does not count as a use.
    pub fn contains_key(&self, key: &K) -> bool {
        self.state().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_is_rejected() {
        assert_eq!(
            LruCache::<u32, u32>::new(0).err(),
            Some(CacheError::ZeroCapacity)
        );
    }

    #[test]
    fn test_count_never_exceeds_capacity() {
        let cache = LruCache::new(3).unwrap();
        for i in 0..50u32 {
            cache.set(i % 7, i);
            if i % 3 == 0 {
                cache.get(&(i % 5));
            }
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_refreshed_entry_survives_eviction() {
        let cache = LruCache::new(2).unwrap();
        cache.set("A", 1);
        cache.set("B", 2);
        assert_eq!(cache.get(&"A"), Some(1));

        let evicted = cache.set("C", 3);

        assert_eq!(evicted, Some("B"));
        assert!(cache.contains_key(&"A"));
        assert!(cache.contains_key(&"C"));
        assert!(!cache.contains_key(&"B"));
    }

    #[test]
    fn test_full_cache_evicts_exactly_one_untouched_entry() {
        // Only asserts that one of the never-read entries goes, not which.
        let cache = LruCache::new(3).unwrap();
        cache.set("A", 1);
        cache.set("B", 2);
        cache.set("C", 3);
        cache.get(&"C");

        cache.set("D", 4);

        assert_eq!(cache.len(), 3);
        assert!(cache.contains_key(&"C"));
        assert!(cache.contains_key(&"D"));
        let survivors = ["A", "B"]
            .iter()
            .filter(|key| cache.contains_key(*key))
            .count();
        assert_eq!(survivors, 1);
    }

    #[test]
    fn test_replacing_existing_key_does_not_evict() {
        let cache = LruCache::new(2).unwrap();
        cache.set("A", 1);
        cache.set("B", 2);

        assert_eq!(cache.set("A", 10), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"A"), Some(10));
        assert_eq!(cache.get(&"B"), Some(2));
    }

    #[test]
    fn test_contains_key_does_not_refresh() {
        let cache = LruCache::new(2).unwrap();
        cache.set("A", 1);
        cache.set("B", 2);
        assert!(cache.contains_key(&"A"));

        cache.set("C", 3);
        assert!(!cache.contains_key(&"A"));
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = LruCache::new(4).unwrap();
        cache.set(1, "one");
        cache.set(2, "two");

        assert_eq!(cache.remove(&1), Some("one"));
        assert_eq!(cache.remove(&1), None);
        assert_eq!(cache.get(&3), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 4);
    }
}
