//! Error types for mapping and persistence operations

use thiserror::Error;
use type_mapping::ConversionError;

use crate::driver::DriverError;

#[derive(Error, Debug)]
pub enum MappingError {
    #[error(
        "Could not determine a table for type: {type_name}. Guesses were: {candidates:?}{}",
        describe_matches(.matches)
    )]
    AmbiguousMapping {
        type_name: String,
        candidates: Vec<String>,
        matches: Vec<String>,
    },

    #[error(
        "Object {type_name} was not properly initialized. Some properties not found in the queried columns: {missing:?}"
    )]
    IncompleteObject {
        type_name: String,
        missing: Vec<String>,
    },

    #[error("Cannot perform {operation} - table {table} has no primary keys")]
    NoPrimaryKey {
        operation: &'static str,
        table: String,
    },

    #[error("Driver failure during {operation}: {source}")]
    Driver {
        operation: &'static str,
        #[source]
        source: DriverError,
    },

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

fn describe_matches(matches: &[String]) -> String {
    if matches.len() > 1 {
        format!(" and we found multiple matching tables: {:?}", matches)
    } else {
        String::new()
    }
}

impl MappingError {
    pub fn driver(operation: &'static str, source: DriverError) -> Self {
        Self::Driver { operation, source }
    }

    pub fn is_driver_failure(&self) -> bool {
        matches!(self, Self::Driver { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_mapping_lists_candidates_and_matches() {
        let err = MappingError::AmbiguousMapping {
            type_name: "Order".to_string(),
            candidates: vec!["Order".to_string(), "Orders".to_string()],
            matches: vec!["ORDER".to_string(), "Orders".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("[\"Order\", \"Orders\"]"));
        assert!(message.contains("multiple matching tables: [\"ORDER\", \"Orders\"]"));
    }

    #[test]
    fn test_ambiguous_mapping_without_matches() {
        let err = MappingError::AmbiguousMapping {
            type_name: "Invoice".to_string(),
            candidates: vec!["Invoice".to_string(), "Invoices".to_string()],
            matches: Vec::new(),
        };
        assert!(!err.to_string().contains("multiple"));
    }
}
