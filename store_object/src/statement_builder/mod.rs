//! Statement construction
//!
//! This module turns discovered table columns into parameterized SELECT,
//! DELETE, INSERT and UPDATE statements. A [`Statement`] carries its SQL
//! together with the columns whose values bind to its placeholders, in
//! placeholder order.

pub mod sql_generation;


use std::sync::Arc;

pub use sql_generation::{quote, SqlGenerator};

use crate::errors::MappingError;
use crate::metadata::{ColumnDescriptor, TableColumns};

/// Generated SQL and the columns bound to its placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    pub statement: Arc<Statement>,
    /// Auto-increment columns whose values the database generates
    pub generated_keys: Vec<String>,
    /// Default-valued columns left out because the object held no value
    pub omitted_defaults: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatement {
    Changed(Arc<Statement>),
    /// No settable column differs from the last read state
    NoChangesDetected,
}

/// Builds statements for one table
pub struct StatementBuilder<'a> {
    columns: &'a TableColumns,
    delimiters: (&'a str, &'a str),
}

impl<'a> StatementBuilder<'a> {
    pub fn new(columns: &'a TableColumns, delimiters: (&'a str, &'a str)) -> Self {
        Self {
            columns,
            delimiters,
        }
    }

    fn primary_keys(&self, operation: &'static str) -> Result<Vec<&'a str>, MappingError> {
        if self.columns.primary_keys.is_empty() {
            return Err(MappingError::NoPrimaryKey {
                operation,
                table: self.columns.table.clone(),
            });
        }
        Ok(self.columns.primary_keys.iter().map(String::as_str).collect())
    }

    /// `SELECT <all columns> FROM <table> WHERE <pk> = ?`
    pub fn select(&self) -> Result<Statement, MappingError> {
        let keys = self.primary_keys("fetch")?;
        let columns: Vec<&str> = self.columns.columns.keys().map(String::as_str).collect();

        Ok(Statement {
            sql: SqlGenerator::select_sql(&self.columns.table, &columns, &keys, self.delimiters),
            parameters: owned(&keys),
        })
    }

    /// `DELETE FROM <table> WHERE <pk> = ?`
    pub fn delete(&self) -> Result<Statement, MappingError> {
        let keys = self.primary_keys("delete")?;

        Ok(Statement {
            sql: SqlGenerator::delete_sql(&self.columns.table, &keys, self.delimiters),
            parameters: owned(&keys),
        })
    }

    /// Insert every non-generated column, leaving out default-valued columns
    /// for which `supplied` reports no value
    pub fn insert(&self, supplied: impl Fn(&ColumnDescriptor) -> bool) -> InsertStatement {
        let mut columns = Vec::new();
        let mut generated_keys = Vec::new();
        let mut omitted_defaults = Vec::new();

        for (name, column) in &self.columns.columns {
            if column.auto_increment {
                generated_keys.push(name.clone());
            } else if column.has_default && !supplied(column) {
                omitted_defaults.push(name.clone());
            } else {
                columns.push(name.as_str());
            }
        }

        InsertStatement {
            statement: Arc::new(Statement {
                sql: SqlGenerator::insert_sql(&self.columns.table, &columns, self.delimiters),
                parameters: owned(&columns),
            }),
            generated_keys,
            omitted_defaults,
        }
    }

    /// Set every non-key, non-generated column for which `changed` holds
    pub fn update(
        &self,
        changed: impl Fn(&ColumnDescriptor) -> bool,
    ) -> Result<UpdateStatement, MappingError> {
        let keys = self.primary_keys("update")?;

        let columns: Vec<&str> = self
            .columns
            .columns
            .iter()
            .filter(|(_, column)| !column.primary && !column.auto_increment && changed(column))
            .map(|(name, _)| name.as_str())
            .collect();

        if columns.is_empty() {
            return Ok(UpdateStatement::NoChangesDetected);
        }

        let mut parameters = owned(&columns);
        parameters.extend(owned(&keys));

        Ok(UpdateStatement::Changed(Arc::new(Statement {
            sql: SqlGenerator::update_sql(&self.columns.table, &columns, &keys, self.delimiters),
            parameters,
        })))
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}
