//! Convenience re-exports for common rowbind usage
//!
//! # Example
//!
//! ```rust
//! use rowbind::prelude::*;
//!
//! let rowbind = Rowbind::default();
//! assert!(rowbind.registry().is_empty());
//! ```

// Core rowbind components
pub use crate::core::Rowbind;
pub use crate::errors::RowbindError;

// Re-export centralized config
pub use config::{AppConfig, CoercionConfig, MetadataConfig};

// Mapped types, sessions and the driver boundary
pub use store_object::prelude::*;

// Re-export the derives for model creation
pub use table_derive::{model, Entity, SqlEnum};

// Types commonly used in mapped structs
pub use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
pub use indexmap::IndexMap;
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
