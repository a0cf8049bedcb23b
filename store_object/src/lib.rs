//! Store Object - mapping core for rowbind
//!
//! This crate maps plain Rust structs onto relational tables discovered from
//! a live connection: table name resolution, column discovery, statement
//! generation, change tracking and the session that ties them together over
//! the [`Connection`] driver boundary.

pub mod change_tracker;
pub mod dialect;
pub mod driver;
pub mod errors;
pub mod metadata;
pub mod prelude;
pub mod session;
pub mod statement_builder;
pub mod traits;

#[cfg(any(test, feature = "sqlite"))]
pub mod sqlite;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

#[cfg(test)]
mod fixtures;

pub use change_tracker::Snapshot;
pub use dialect::ConnectionType;
pub use driver::{CatalogColumn, Connection, DriverError, ResultColumn, ResultRow, ResultSet};
pub use errors::MappingError;
pub use metadata::{ColumnDescriptor, MetadataCache, MetadataRegistry, TableColumns};
pub use session::Session;
pub use statement_builder::{InsertStatement, Statement, StatementBuilder, UpdateStatement};
pub use traits::*;
