//! Relational driver boundary
//!
//! This module defines what the mapper needs from a connection: catalog
//! listings, parameterized execution and positional access to result rows.
//! Transport, pooling and transaction lifecycle stay with the driver.

use thiserror::Error;
use type_mapping::{ColumnSource, ConversionError, SemanticType, Value};

type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error raised by a driver call, with the driver's own cause attached
#[derive(Error, Debug)]
#[error("{message}")]
pub struct DriverError {
    message: String,
    #[source]
    cause: Option<BoxedCause>,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(message: impl Into<String>, cause: impl Into<BoxedCause>) -> Self {
        Self {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// One entry of the catalog's column listing for a table
///
/// `None` fields model drivers that do not report that piece of metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogColumn {
    pub name: String,
    pub data_type: Option<i32>,
    pub type_name: Option<String>,
    /// Default expression, if the column has one
    pub default: Option<String>,
    pub is_autoincrement: Option<bool>,
}

/// Metadata of one column of a query result
#[derive(Debug, Clone, PartialEq)]
pub struct ResultColumn {
    pub label: String,
    pub type_code: Option<i32>,
    pub type_name: Option<String>,
    pub display_size: Option<usize>,
    pub auto_increment: bool,
}

impl ResultColumn {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            type_code: None,
            type_name: None,
            display_size: None,
            auto_increment: false,
        }
    }

    pub fn semantic_type(&self) -> Option<SemanticType> {
        SemanticType::resolve(self.type_code, self.type_name.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<ResultColumn>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<ResultColumn>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Position of the column labelled `label`, ignoring case
    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.label.eq_ignore_ascii_case(label))
    }

    pub fn row(&self, index: usize) -> Option<ResultRow<'_>> {
        self.rows.get(index).map(|values| ResultRow {
            columns: &self.columns,
            values,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = ResultRow<'_>> {
        self.rows.iter().map(|values| ResultRow {
            columns: &self.columns,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Borrowed view of one result row
#[derive(Debug, Clone, Copy)]
pub struct ResultRow<'a> {
    columns: &'a [ResultColumn],
    values: &'a [Value],
}

impl<'a> ResultRow<'a> {
    pub fn columns(&self) -> &'a [ResultColumn] {
        self.columns
    }

    pub fn get(&self, label: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|column| column.label.eq_ignore_ascii_case(label))
            .and_then(|index| self.values.get(index))
    }
}

impl ColumnSource for ResultRow<'_> {
    fn get_object(&self, index: usize) -> Result<Value, ConversionError> {
        self.values
            .get(index)
            .cloned()
            .ok_or_else(|| ConversionError::Source {
                column: self
                    .columns
                    .get(index)
                    .map(|column| column.label.clone())
                    .unwrap_or_else(|| index.to_string()),
                message: "column index out of range".to_string(),
            })
    }
}

/// A live connection to a relational database
///
/// SQL handed to [`Connection::query`] and friends uses `?` positional
/// placeholders, bound in slice order.
pub trait Connection {
    /// Resolved endpoint identity; connections to the same target share metadata
    fn endpoint(&self) -> &str;

    fn table_names(&mut self) -> Result<Vec<String>, DriverError>;

    fn catalog_columns(&mut self, table: &str) -> Result<Vec<CatalogColumn>, DriverError>;

    /// Primary key column names in key order
    fn primary_keys(&mut self, table: &str) -> Result<Vec<String>, DriverError>;

    /// Characters tolerated in unquoted identifiers beyond letters, digits and `_`
    fn extra_name_characters(&mut self) -> Result<String, DriverError> {
        Ok(String::new())
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, DriverError>;

    /// Execute a statement, returning the affected row count
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DriverError>;

    /// Execute an insert and return the values generated for `key_columns`
    fn execute_returning_keys(
        &mut self,
        sql: &str,
        params: &[Value],
        key_columns: &[&str],
    ) -> Result<(u64, ResultSet), DriverError>;

    fn is_auto_commit(&self) -> bool {
        true
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_driver_error_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "socket closed");
        let err = DriverError::with_cause("query failed", io);
        assert_eq!(err.to_string(), "query failed");
        assert_eq!(err.source().map(|e| e.to_string()), Some("socket closed".to_string()));
    }

    #[test]
    fn test_result_row_lookup_ignores_case() {
        let rs = ResultSet::new(
            vec![ResultColumn::new("ID"), ResultColumn::new("Name")],
            vec![vec![Value::I64(1), Value::Text("one".into())]],
        );
        let row = rs.row(0).unwrap();
        assert_eq!(row.get("name"), Some(&Value::Text("one".into())));
        assert_eq!(rs.column_index("id"), Some(0));
        assert!(row.get_object(5).is_err());
    }
}
