//! Session
//!
//! A [`Session`] borrows one connection and the endpoint's shared
//! [`MetadataCache`] and runs the mapper's operations: keyed CRUD on entity
//! instances and mapped queries. Values cross the driver boundary through the
//! [`Coercer`] in both directions.
//!
//! Whenever a driver call fails on a connection that is not in auto-commit
//! mode, the session rolls the connection back before returning the error.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{error, warn};
use type_mapping::{debug_log, Coercer, FieldType, Value};

use crate::change_tracker::save_read_state;
use crate::driver::{Connection, ResultRow, ResultSet};
use crate::errors::MappingError;
use crate::metadata::{MetadataCache, TableColumns};
use crate::statement_builder::{Statement, UpdateStatement};
use crate::traits::{Entity, EntityDescriptor};

pub struct Session<'c> {
    connection: &'c mut dyn Connection,
    metadata: Arc<MetadataCache>,
    coercer: Coercer,
}

impl<'c> Session<'c> {
    pub fn new(connection: &'c mut dyn Connection, metadata: Arc<MetadataCache>, coercer: Coercer) -> Self {
        Self {
            connection,
            metadata,
            coercer,
        }
    }

    pub fn metadata(&self) -> &MetadataCache {
        &self.metadata
    }

    pub fn connection(&mut self) -> &mut dyn Connection {
        &mut *self.connection
    }

    /// Insert `object`, writing generated keys back into it
    ///
    /// When a default-valued column was left out, the object is re-read by
    /// primary key so it carries the values the database filled in.
    pub fn insert<T: Entity>(&mut self, object: &mut T) -> Result<u64, MappingError> {
        self.rolling_back(|session| session.insert_object(object))
    }

    /// Update `object` by primary key
    ///
    /// Change-tracked objects only set the columns that changed since they
    /// were last read; with nothing changed no statement runs and the result
    /// is `0`.
    pub fn update<T: Entity>(&mut self, object: &mut T) -> Result<u64, MappingError> {
        self.rolling_back(|session| session.update_object(object))
    }

    pub fn delete<T: Entity>(&mut self, object: &T) -> Result<u64, MappingError> {
        self.rolling_back(|session| {
            let metadata = Arc::clone(&session.metadata);
            let statement = metadata.delete_statement::<T>(session.connection)?;
            let params = session.bind(&statement, object)?;
            session.execute_statement("delete", &statement.sql, &params)
        })
    }

    /// Re-read `object` by the primary key values it holds
    ///
    /// Returns `false`, leaving the object untouched, when no row matches.
    pub fn fetch<T: Entity>(&mut self, object: &mut T) -> Result<bool, MappingError> {
        self.rolling_back(|session| session.fetch_object(object))
    }

    /// Read the `T` whose primary key columns hold `keys`, in key order
    pub fn fetch_by_key<T: Entity + Default>(&mut self, keys: &[Value]) -> Result<Option<T>, MappingError> {
        self.rolling_back(|session| {
            let metadata = Arc::clone(&session.metadata);
            let statement = metadata.select_statement::<T>(session.connection)?;
            if keys.len() != statement.parameters.len() {
                return Err(MappingError::InvalidOperation(format!(
                    "{} has {} primary key columns but {} key values were given",
                    T::type_name(),
                    statement.parameters.len(),
                    keys.len()
                )));
            }

            let columns = metadata.columns_of::<T>(session.connection)?;
            let params = statement
                .parameters
                .iter()
                .zip(keys)
                .map(|(name, key)| {
                    let length = columns.get(name).and_then(|column| column.length);
                    session.coercer.coerce_out(key.clone(), name, length)
                })
                .collect::<Result<Vec<_>, _>>()?;

            let result = session.run_query("fetch", &statement.sql, &params)?;
            Ok(session.read_all::<T>(&result)?.into_iter().next())
        })
    }

    /// Run `sql` and map every row to a new `T`
    pub fn query<T: Entity + Default>(&mut self, sql: &str, params: &[Value]) -> Result<Vec<T>, MappingError> {
        self.rolling_back(|session| {
            let params = session.bind_free(params)?;
            let result = session.run_query("query", sql, &params)?;
            session.read_all::<T>(&result)
        })
    }

    /// Run `sql` and map its first row, if any
    pub fn fetch_one<T: Entity + Default>(&mut self, sql: &str, params: &[Value]) -> Result<Option<T>, MappingError> {
        Ok(self.query::<T>(sql, params)?.into_iter().next())
    }

    /// Run `sql` and read the first column of every row as `V`
    pub fn query_scalar<V: FieldType>(&mut self, sql: &str, params: &[Value]) -> Result<Vec<V>, MappingError> {
        self.rolling_back(|session| {
            let params = session.bind_free(params)?;
            let result = session.run_query("query", sql, &params)?;
            let Some(column) = result.columns.first() else {
                return Ok(Vec::new());
            };

            let mut values = Vec::with_capacity(result.len());
            for row in result.iter() {
                let value = session.coercer.read_value(
                    &row,
                    0,
                    column.semantic_type(),
                    &column.label,
                    &V::PROPERTY_TYPE,
                )?;
                values.push(V::from_value(value)?);
            }
            Ok(values)
        })
    }

    /// Run `sql` and return the raw driver values of every row, by label
    pub fn query_rows(&mut self, sql: &str, params: &[Value]) -> Result<Vec<IndexMap<String, Value>>, MappingError> {
        self.rolling_back(|session| {
            let params = session.bind_free(params)?;
            let result = session.run_query("query", sql, &params)?;
            Ok(result
                .rows
                .iter()
                .map(|values| {
                    result
                        .columns
                        .iter()
                        .map(|column| column.label.clone())
                        .zip(values.iter().cloned())
                        .collect::<IndexMap<String, Value>>()
                })
                .collect())
        })
    }

    /// Run a statement that returns no rows
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, MappingError> {
        self.rolling_back(|session| {
            let params = session.bind_free(params)?;
            session.execute_statement("execute", sql, &params)
        })
    }

    fn rolling_back<R>(
        &mut self,
        operation: impl FnOnce(&mut Self) -> Result<R, MappingError>,
    ) -> Result<R, MappingError> {
        let result = operation(self);
        if let Err(err) = &result {
            if err.is_driver_failure() && !self.connection.is_auto_commit() {
                debug_log!("rolling back after: {}", err);
                if let Err(rollback) = self.connection.rollback() {
                    error!(
                        error = %rollback,
                        cause = %err,
                        "Rollback failed after a driver error"
                    );
                }
            }
        }
        result
    }

    fn insert_object<T: Entity>(&mut self, object: &mut T) -> Result<u64, MappingError> {
        let metadata = Arc::clone(&self.metadata);
        let insert = metadata.insert_statement(&*object, self.connection)?;
        let columns = metadata.columns_of::<T>(self.connection)?;
        let descriptor = metadata.descriptor::<T>();
        let params = self.bind(&insert.statement, &*object)?;

        let key_columns: Vec<&str> = insert.generated_keys.iter().map(String::as_str).collect();
        debug_log!("insert: {} {:?}", insert.statement.sql, params);
        let (count, generated) = self
            .connection
            .execute_returning_keys(&insert.statement.sql, &params, &key_columns)
            .map_err(|e| MappingError::driver("insert", e))?;

        if let Some(row) = generated.row(0) {
            for (position, key) in insert.generated_keys.iter().enumerate() {
                let Some(result_column) = row.columns().get(position) else {
                    break;
                };
                let Some(column) = columns.get(key) else {
                    continue;
                };
                let Some(property) = descriptor.property(column.property) else {
                    continue;
                };
                let kind = result_column.semantic_type().or(column.semantic_type);
                let value =
                    self.coercer
                        .read_value(&row, position, kind, key, &property.property_type)?;
                property.write(object, value)?;
            }
        }

        if !insert.omitted_defaults.is_empty() && !columns.primary_keys.is_empty() {
            self.fetch_object(object)?;
        } else {
            save_read_state(object, &descriptor);
        }
        Ok(count)
    }

    fn update_object<T: Entity>(&mut self, object: &mut T) -> Result<u64, MappingError> {
        let metadata = Arc::clone(&self.metadata);
        match metadata.update_statement(&*object, self.connection)? {
            UpdateStatement::NoChangesDetected => {
                warn!(
                    type_name = T::type_name(),
                    "No properties changed. No update required for {}",
                    T::type_name()
                );
                Ok(0)
            }
            UpdateStatement::Changed(statement) => {
                let params = self.bind(&statement, &*object)?;
                let count = self.execute_statement("update", &statement.sql, &params)?;
                save_read_state(object, &metadata.descriptor::<T>());
                Ok(count)
            }
        }
    }

    fn fetch_object<T: Entity>(&mut self, object: &mut T) -> Result<bool, MappingError> {
        let metadata = Arc::clone(&self.metadata);
        let statement = metadata.select_statement::<T>(self.connection)?;
        let params = self.bind(&statement, &*object)?;
        let result = self.run_query("fetch", &statement.sql, &params)?;

        let Some(row) = result.row(0) else {
            return Ok(false);
        };
        let bindings = metadata.bindings_for::<T>(&result, self.connection)?;
        let columns = metadata.columns_of::<T>(self.connection)?;
        let descriptor = metadata.descriptor::<T>();
        self.read_row(row, &bindings, Some(&*columns), &descriptor, object)?;
        save_read_state(object, &descriptor);
        Ok(true)
    }

    fn read_all<T: Entity + Default>(&mut self, result: &ResultSet) -> Result<Vec<T>, MappingError> {
        if result.columns.is_empty() {
            return Ok(Vec::new());
        }

        let metadata = Arc::clone(&self.metadata);
        let bindings = metadata.bindings_for::<T>(result, self.connection)?;
        let columns = if T::is_query_result() {
            None
        } else {
            Some(metadata.columns_of::<T>(self.connection)?)
        };
        let descriptor = metadata.descriptor::<T>();

        let mut objects = Vec::with_capacity(result.len());
        for row in result.iter() {
            let mut object = T::default();
            self.read_row(row, &bindings, columns.as_deref(), &descriptor, &mut object)?;
            save_read_state(&mut object, &descriptor);
            objects.push(object);
        }
        Ok(objects)
    }

    /// Populate `object` from `row`
    ///
    /// A null clears an `Option` property and leaves a non-nullable one as is.
    fn read_row<T: Entity>(
        &self,
        row: ResultRow<'_>,
        bindings: &IndexMap<String, usize>,
        columns: Option<&TableColumns>,
        descriptor: &EntityDescriptor<T>,
        object: &mut T,
    ) -> Result<(), MappingError> {
        let mut missing: Vec<String> = descriptor
            .mappable()
            .filter(|index| !bindings.values().any(|bound| bound == index))
            .filter_map(|index| descriptor.property(index))
            .map(|property| property.name.to_string())
            .collect();
        if missing.is_empty() {
            if let Some(columns) = columns {
                missing = columns
                    .columns
                    .keys()
                    .filter(|name| {
                        !row.columns()
                            .iter()
                            .any(|column| column.label.eq_ignore_ascii_case(name))
                    })
                    .cloned()
                    .collect();
            }
        }
        if !missing.is_empty() {
            return Err(MappingError::IncompleteObject {
                type_name: T::type_name().to_string(),
                missing,
            });
        }

        for (label, index) in bindings {
            let Some(position) = row
                .columns()
                .iter()
                .position(|column| column.label.eq_ignore_ascii_case(label))
            else {
                continue;
            };
            let Some(property) = descriptor.property(*index) else {
                continue;
            };

            let kind = row.columns()[position].semantic_type().or_else(|| {
                columns
                    .and_then(|columns| columns.get(label))
                    .and_then(|column| column.semantic_type)
            });
            let value = self
                .coercer
                .read_value(&row, position, kind, label, &property.property_type)?;
            property.write(object, value)?;
        }
        Ok(())
    }

    /// Values of `object` for the columns bound by `statement`
    fn bind<T: Entity>(&mut self, statement: &Statement, object: &T) -> Result<Vec<Value>, MappingError> {
        let metadata = Arc::clone(&self.metadata);
        let columns = metadata.columns_of::<T>(self.connection)?;
        let descriptor = metadata.descriptor::<T>();

        statement
            .parameters
            .iter()
            .map(|name| -> Result<Value, MappingError> {
                let column = columns.get(name).ok_or_else(|| {
                    MappingError::InvalidOperation(format!(
                        "column {} of {} is not mapped",
                        name,
                        T::type_name()
                    ))
                })?;
                let value = descriptor
                    .property(column.property)
                    .map(|property| property.read(object))
                    .unwrap_or(Value::Null);
                Ok(self.coercer.coerce_out(value, name, column.length)?)
            })
            .collect()
    }

    /// Caller-supplied parameters for free-form SQL
    fn bind_free(&self, params: &[Value]) -> Result<Vec<Value>, MappingError> {
        params
            .iter()
            .enumerate()
            .map(|(position, value)| -> Result<Value, MappingError> {
                Ok(self
                    .coercer
                    .coerce_out(value.clone(), &format!("parameter {}", position + 1), None)?)
            })
            .collect()
    }

    fn run_query(&mut self, operation: &'static str, sql: &str, params: &[Value]) -> Result<ResultSet, MappingError> {
        debug_log!("{}: {} {:?}", operation, sql, params);
        self.connection
            .query(sql, params)
            .map_err(|e| MappingError::driver(operation, e))
    }

    fn execute_statement(&mut self, operation: &'static str, sql: &str, params: &[Value]) -> Result<u64, MappingError> {
        debug_log!("{}: {} {:?}", operation, sql, params);
        self.connection
            .execute(sql, params)
            .map_err(|e| MappingError::driver(operation, e))
    }
}
