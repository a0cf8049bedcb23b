//! Convenience re-exports for common store-object usage

// Mapping capabilities
pub use crate::traits::{ColumnHints, Entity, EntityDescriptor, PropertyDescriptor};
pub use crate::change_tracker::Snapshot;

// Driver boundary
pub use crate::driver::{Connection, DriverError, ResultSet};

// Error types
pub use crate::errors::MappingError;

// Orchestration
pub use crate::metadata::MetadataRegistry;
pub use crate::session::Session;

// Value model (re-exported from type_mapping)
pub use type_mapping::{FieldType, PropertyType, Value};
