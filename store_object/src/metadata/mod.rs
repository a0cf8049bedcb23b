//! Metadata discovery and caching
//!
//! This module resolves table names, discovers column descriptors from the
//! live catalog and keeps everything, including generated SQL, in one
//! [`MetadataCache`] per connection endpoint.

pub mod cache;
pub mod columns;
pub mod properties;
pub mod registry;
pub mod table_name;

pub use cache::MetadataCache;
pub use columns::{ColumnDescriptor, TableColumns};
pub use registry::MetadataRegistry;
pub use table_name::{resolve_table_name, table_name_guesses};
