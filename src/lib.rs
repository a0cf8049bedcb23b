//! # rowbind
//!
//! A lightweight object-relational mapper that binds plain structs to tables
//! by naming convention, refined by declarative hints and the live catalog.
//! Table names, column metadata and generated SQL are discovered once per
//! connection endpoint and cached; values cross the driver boundary through a
//! coercion engine that warns about lossy conversions.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rowbind::prelude::*;
//!
//! #[model]
//! pub struct Order {
//!     #[primary_key]
//!     #[auto_increment]
//!     pub id: i64,
//!     pub name: String,
//!     #[has_default]
//!     pub created: Option<NaiveDateTime>,
//! }
//!
//! fn place(rowbind: &Rowbind, connection: &mut dyn Connection) -> Result<i64, RowbindError> {
//!     let mut session = rowbind.session(connection)?;
//!
//!     // Resolves to the "Orders" table; ID and CREATED are filled in
//!     let mut order = Order { name: "first".into(), ..Order::default() };
//!     session.insert(&mut order)?;
//!
//!     Ok(order.id)
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
pub use type_mapping::{debug_log, trace_log};

pub mod core;
pub mod errors;
pub mod prelude;

// Re-export the main public types for convenience
pub use crate::core::Rowbind;
pub use crate::errors::RowbindError;

// Re-export centralized config
pub use config::{AppConfig, CoercionConfig, MetadataConfig};

pub use store_object::Entity;
pub use table_derive::{model, Entity, SqlEnum};

// Re-export internal crates used by macros and public API
// These MUST be public for the generated macro code to work correctly
pub use cache_system;
pub use store_object;
pub use type_mapping;

// Re-export external dependencies used in public API
pub use serde_json;
