//! Convenience re-exports for common cache-system usage

pub use crate::registry::InstanceRegistry;
pub use crate::type_cache::TypeCache;
