//! Per-key populate-once cache
//!
//! Reads take a shared lock. Population of missing entries is serialized by a
//! separate mutex so a racing reader never observes a partially built value;
//! an entry, once stored, is only ever replaced by removing it first.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use parking_lot::{Mutex, RwLock};

pub struct TypeCache<K, V> {
    entries: RwLock<HashMap<K, V>>,
    population: Mutex<()>,
}

impl<K, V> fmt::Debug for TypeCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.entries.try_read().map(|entries| entries.len());
        f.debug_struct("TypeCache").field("len", &len).finish()
    }
}

impl<K, V> Default for TypeCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TypeCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(capacity)),
            population: Mutex::new(()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Store `value` unless an entry already exists; returns the retained value
    pub fn insert(&self, key: K, value: V) -> V {
        self.entries.write().entry(key).or_insert(value).clone()
    }

    /// Return the cached entry, building it with `populate` when absent
    ///
    /// Population runs under the cache's population lock, after re-checking
    /// for an entry stored by a racing caller. A failed population stores
    /// nothing.
    pub fn get_or_try_populate<E, F>(&self, key: &K, populate: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let _population = self.population.lock();
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = populate()?;
        Ok(self.insert(key.clone(), value))
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_populates_once() {
        let cache: TypeCache<&str, String> = TypeCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_try_populate::<(), _>(&"orders", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("Orders".to_string())
                })
                .unwrap();
            assert_eq!(value, "Orders");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_population_stores_nothing() {
        let cache: TypeCache<u32, u32> = TypeCache::new();
        let result = cache.get_or_try_populate(&1, || Err("catalog unavailable"));
        assert_eq!(result, Err("catalog unavailable"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_panicking_population_leaves_cache_usable() {
        let cache: TypeCache<u32, u32> = TypeCache::new();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cache.get_or_try_populate::<(), _>(&1, || panic!("driver panicked"))
        }));
        assert!(outcome.is_err());

        assert_eq!(cache.get_or_try_populate::<(), _>(&1, || Ok(10)), Ok(10));
        assert_eq!(cache.insert(2, 20), 20);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_first_insert_wins() {
        let cache: TypeCache<u32, &str> = TypeCache::new();
        assert_eq!(cache.insert(1, "first"), "first");
        assert_eq!(cache.insert(1, "second"), "first");
        assert_eq!(cache.remove(&1), Some("first"));
        assert_eq!(cache.insert(1, "second"), "second");
    }

    #[test]
    fn test_concurrent_population_is_serialized() {
        let cache: Arc<TypeCache<u32, usize>> = Arc::new(TypeCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_try_populate::<(), _>(&7, || Ok(calls.fetch_add(1, Ordering::SeqCst)))
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.iter().all(|r| *r == results[0]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
