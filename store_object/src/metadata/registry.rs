//! Process-wide registry of metadata caches, one per connection endpoint

use std::sync::Arc;

use cache_system::InstanceRegistry;
use config::MetadataConfig;

use crate::driver::Connection;
use crate::errors::MappingError;
use crate::metadata::MetadataCache;

#[derive(Debug, Default)]
pub struct MetadataRegistry {
    config: MetadataConfig,
    instances: InstanceRegistry<String, MetadataCache>,
}

impl MetadataRegistry {
    pub fn new(config: MetadataConfig) -> Self {
        Self {
            config,
            instances: InstanceRegistry::new(),
        }
    }

    pub fn config(&self) -> &MetadataConfig {
        &self.config
    }

    /// The cache for `connection`'s endpoint, created on first use
    ///
    /// Connections reporting the same endpoint share one cache.
    pub fn metadata_for(&self, connection: &mut dyn Connection) -> Result<Arc<MetadataCache>, MappingError> {
        let endpoint = connection.endpoint().to_string();
        self.instances
            .get_or_try_create(&endpoint, || MetadataCache::new(connection, &self.config))
    }

    /// Drop the cache of `endpoint`; the next connection rediscovers everything
    pub fn evict(&self, endpoint: &str) -> Option<Arc<MetadataCache>> {
        self.instances.remove(&endpoint.to_string())
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
