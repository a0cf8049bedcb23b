//! Error types for value conversion
//!
//! Lossy conversions are warnings by default; `Truncation` and `Overflow`
//! only surface when the coercer runs in strict mode.

use thiserror::Error;

use crate::types::PropertyType;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("Cannot convert a {found} value into {expected}")]
    TypeMismatch {
        expected: PropertyType,
        found: &'static str,
    },

    #[error("Cannot parse '{value}' as {target}: {reason}")]
    Parse {
        value: String,
        target: PropertyType,
        reason: String,
    },

    #[error("'{value}' does not name a constant of {target}")]
    UnknownVariant { value: String, target: PropertyType },

    #[error("Value for column {column} is {actual} characters, longer than its length {length}")]
    Truncation {
        column: String,
        length: usize,
        actual: usize,
    },

    #[error("Value {value} ({source_kind}) for column {column} overflows {target}")]
    Overflow {
        column: String,
        value: String,
        source_kind: &'static str,
        target: PropertyType,
    },

    #[error("Failed to read column {column}: {message}")]
    Source { column: String, message: String },
}
