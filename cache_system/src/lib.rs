//! In-process caches for discovered metadata
//!
//! This crate provides the concurrent, populate-once maps used to hold
//! per-type metadata and per-endpoint metadata instances.

pub mod prelude;
pub mod registry;
pub mod type_cache;

pub use registry::InstanceRegistry;
pub use type_cache::TypeCache;
