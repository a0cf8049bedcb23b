//! Unified type model shared across the rowbind ecosystem
//!
//! This crate owns the runtime value representation exchanged with drivers,
//! the driver-independent column kinds, the declared property types of mapped
//! structs and the coercion engine converting between them.

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        ::tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        ::tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod coerce;
pub mod errors;
pub mod sql;
pub mod types;

pub use coerce::{CoercionOptions, Coercer, ColumnSource, DEFAULT_DATE_FORMAT};
pub use errors::ConversionError;
pub use sql::{type_codes, SemanticType};
pub use types::{FieldType, PropertyType, Value};
