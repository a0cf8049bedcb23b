//! Registry of shared instances keyed by identity
//!
//! Used to keep exactly one metadata instance per connection endpoint. The
//! registry lock is held while an instance is created, so a second caller for
//! the same key waits and then receives the instance the first one built.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

pub struct InstanceRegistry<K, V> {
    instances: Mutex<HashMap<K, Arc<V>>>,
}

impl<K, V> fmt::Debug for InstanceRegistry<K, V>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.instances.try_lock() {
            Some(instances) => f
                .debug_struct("InstanceRegistry")
                .field("keys", &instances.keys().collect::<Vec<_>>())
                .finish(),
            None => f.debug_struct("InstanceRegistry").finish_non_exhaustive(),
        }
    }
}

impl<K, V> Default for InstanceRegistry<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> InstanceRegistry<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.instances.lock().get(key).cloned()
    }

    pub fn get_or_try_create<E, F>(&self, key: &K, create: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let mut instances = self.instances.lock();
        if let Some(existing) = instances.get(key) {
            return Ok(Arc::clone(existing));
        }

        let instance = Arc::new(create()?);
        instances.insert(key.clone(), Arc::clone(&instance));
        #[cfg(feature = "debug-logging")]
        tracing::debug!(registered = instances.len(), "Registered new shared instance");
        Ok(instance)
    }

    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.instances.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
