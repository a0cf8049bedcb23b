//! Per-endpoint metadata cache
//!
//! One [`MetadataCache`] exists per resolved connection endpoint. It loads
//! the catalog's table names once, then lazily discovers and stores, per
//! mapped type: the property descriptor, the table name, the column
//! descriptors and the generated statements. Every entry is populated at
//! most once; concurrent first calls for the same type are serialized and
//! all callers observe the same result.

use std::any::{Any, TypeId};
use std::convert::Infallible;
use std::sync::Arc;

use cache_system::TypeCache;
use config::MetadataConfig;
use indexmap::IndexMap;
use type_mapping::debug_log;

use crate::change_tracker::changed_properties;
use crate::dialect::ConnectionType;
use crate::driver::{Connection, ResultSet};
use crate::errors::MappingError;
use crate::metadata::columns::{discover_columns, TableColumns};
use crate::metadata::properties::map_labels;
use crate::metadata::table_name::resolve_table_name;
use crate::statement_builder::{InsertStatement, Statement, StatementBuilder, UpdateStatement};
use crate::traits::{Entity, EntityDescriptor};

type AnyDescriptor = Arc<dyn Any + Send + Sync>;
type Bindings = Arc<IndexMap<String, usize>>;

/// Bindings of a type and the result labels they were built from
#[derive(Debug)]
struct LabelBindings {
    labels: Vec<String>,
    bindings: Bindings,
}

pub struct MetadataCache {
    endpoint: String,
    connection_type: ConnectionType,
    delimiters: (String, String),
    extra_name_characters: String,
    table_names: Vec<String>,

    descriptors: TypeCache<TypeId, AnyDescriptor>,
    tables: TypeCache<TypeId, String>,
    columns: TypeCache<TypeId, Arc<TableColumns>>,
    bindings: TypeCache<TypeId, Arc<LabelBindings>>,
    selects: TypeCache<TypeId, Arc<Statement>>,
    deletes: TypeCache<TypeId, Arc<Statement>>,
    inserts: TypeCache<TypeId, Arc<InsertStatement>>,
    updates: TypeCache<TypeId, Arc<Statement>>,
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("endpoint", &self.endpoint)
            .field("connection_type", &self.connection_type)
            .field("table_names", &self.table_names.len())
            .field("columns", &self.columns)
            .finish()
    }
}

impl MetadataCache {
    /// Load the endpoint-level metadata: table names and identifier rules
    pub fn new(connection: &mut dyn Connection, config: &MetadataConfig) -> Result<Self, MappingError> {
        let endpoint = connection.endpoint().to_string();
        let connection_type = ConnectionType::from_endpoint(&endpoint);
        let (start, end) = config
            .delimiters()
            .unwrap_or_else(|| connection_type.delimiters());

        let extra_name_characters = connection
            .extra_name_characters()
            .map_err(|e| MappingError::driver("metadata", e))?;

        let mut table_names: Vec<String> = Vec::new();
        for name in connection
            .table_names()
            .map_err(|e| MappingError::driver("metadata", e))?
        {
            if !table_names.contains(&name) {
                table_names.push(name);
            }
        }
        debug_log!(
            "loaded {} table names for {} ({})",
            table_names.len(),
            endpoint,
            connection_type
        );

        let capacity = config.initial_capacity;
        Ok(Self {
            endpoint,
            connection_type,
            delimiters: (start.to_string(), end.to_string()),
            extra_name_characters,
            table_names,
            descriptors: TypeCache::with_capacity(capacity),
            tables: TypeCache::with_capacity(capacity),
            columns: TypeCache::with_capacity(capacity),
            bindings: TypeCache::with_capacity(capacity),
            selects: TypeCache::with_capacity(capacity),
            deletes: TypeCache::with_capacity(capacity),
            inserts: TypeCache::with_capacity(capacity),
            updates: TypeCache::with_capacity(capacity),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    pub fn delimiters(&self) -> (&str, &str) {
        (&self.delimiters.0, &self.delimiters.1)
    }

    pub fn extra_name_characters(&self) -> &str {
        &self.extra_name_characters
    }

    pub fn table_names(&self) -> &[String] {
        &self.table_names
    }

    /// The frozen property descriptor of `T`
    pub fn descriptor<T: Entity>(&self) -> Arc<EntityDescriptor<T>> {
        let cached = self
            .descriptors
            .get_or_try_populate(&TypeId::of::<T>(), || {
                debug_log!("describing {}", T::type_name());
                Ok::<AnyDescriptor, Infallible>(Arc::new(T::describe()))
            })
            .unwrap_or_else(|never| match never {});

        cached
            .downcast::<EntityDescriptor<T>>()
            .unwrap_or_else(|_| Arc::new(T::describe()))
    }

    /// The table `T` maps to
    pub fn table_name<T: Entity>(&self) -> Result<String, MappingError> {
        if T::is_query_result() {
            return Err(MappingError::InvalidOperation(format!(
                "{} is a query result type and has no table",
                T::type_name()
            )));
        }

        self.tables.get_or_try_populate(&TypeId::of::<T>(), || {
            let table = resolve_table_name(T::type_name(), T::table_hint(), &self.table_names)?;
            debug_log!("{} maps to table {}", T::type_name(), table);
            Ok(table)
        })
    }

    /// Column descriptors of `T`'s table, discovered on first use
    pub fn columns_of<T: Entity>(
        &self,
        connection: &mut dyn Connection,
    ) -> Result<Arc<TableColumns>, MappingError> {
        if let Some(columns) = self.columns.get(&TypeId::of::<T>()) {
            return Ok(columns);
        }

        let table = self.table_name::<T>()?;
        let descriptor = self.descriptor::<T>();
        self.columns.get_or_try_populate(&TypeId::of::<T>(), || {
            discover_columns(
                connection,
                &table,
                &descriptor,
                &self.extra_name_characters,
                self.delimiters(),
            )
            .map(Arc::new)
        })
    }

    pub fn primary_keys_of<T: Entity>(
        &self,
        connection: &mut dyn Connection,
    ) -> Result<Vec<String>, MappingError> {
        Ok(self.columns_of::<T>(connection)?.primary_keys.clone())
    }

    /// Label to property bindings of `T` for the columns of `result`
    ///
    /// Table-backed types bind through their discovered columns; query
    /// result types bind by label alone. One entry is kept per type, built
    /// from the first result read; results with other labels are bound
    /// afresh on every call.
    pub fn bindings_for<T: Entity>(
        &self,
        result: &ResultSet,
        connection: &mut dyn Connection,
    ) -> Result<Bindings, MappingError> {
        let labels: Vec<String> = result.columns.iter().map(|c| c.label.clone()).collect();
        let key = TypeId::of::<T>();
        if let Some(cached) = self.bindings.get(&key) {
            if cached.labels == labels {
                return Ok(Arc::clone(&cached.bindings));
            }
        }

        let descriptor = self.descriptor::<T>();
        let bindings = if T::is_query_result() {
            map_labels(
                &descriptor,
                labels.iter().map(String::as_str),
                &self.extra_name_characters,
            )
        } else {
            let columns = self.columns_of::<T>(connection)?;
            let mut bindings = IndexMap::new();
            for label in &labels {
                match columns.get(label) {
                    Some(column) => {
                        bindings.insert(label.clone(), column.property);
                    }
                    None => {
                        debug_log!(
                            "Property not found for column: {} type: {}",
                            label,
                            T::type_name()
                        );
                    }
                }
            }
            bindings
        };

        let bindings = Arc::new(bindings);
        let retained = self.bindings.insert(
            key,
            Arc::new(LabelBindings {
                labels,
                bindings: Arc::clone(&bindings),
            }),
        );
        if Arc::ptr_eq(&retained.bindings, &bindings) {
            debug_log!("bindings of {} cached", T::type_name());
        }
        Ok(bindings)
    }

    pub fn select_statement<T: Entity>(
        &self,
        connection: &mut dyn Connection,
    ) -> Result<Arc<Statement>, MappingError> {
        if let Some(statement) = self.selects.get(&TypeId::of::<T>()) {
            return Ok(statement);
        }
        let columns = self.columns_of::<T>(connection)?;
        self.selects.get_or_try_populate(&TypeId::of::<T>(), || {
            let statement = StatementBuilder::new(&columns, self.delimiters()).select()?;
            debug_log!("select for {}: {}", T::type_name(), statement.sql);
            Ok(Arc::new(statement))
        })
    }

    pub fn delete_statement<T: Entity>(
        &self,
        connection: &mut dyn Connection,
    ) -> Result<Arc<Statement>, MappingError> {
        if let Some(statement) = self.deletes.get(&TypeId::of::<T>()) {
            return Ok(statement);
        }
        let columns = self.columns_of::<T>(connection)?;
        self.deletes.get_or_try_populate(&TypeId::of::<T>(), || {
            let statement = StatementBuilder::new(&columns, self.delimiters()).delete()?;
            debug_log!("delete for {}: {}", T::type_name(), statement.sql);
            Ok(Arc::new(statement))
        })
    }

    /// Insert statement for `object`
    ///
    /// Tables with default-valued columns get a statement per object, since
    /// a default column is left out whenever the object holds no value for
    /// it. Statements for all other tables are cached.
    pub fn insert_statement<T: Entity>(
        &self,
        object: &T,
        connection: &mut dyn Connection,
    ) -> Result<Arc<InsertStatement>, MappingError> {
        if let Some(statement) = self.inserts.get(&TypeId::of::<T>()) {
            return Ok(statement);
        }

        let columns = self.columns_of::<T>(connection)?;
        let descriptor = self.descriptor::<T>();
        let insert = Arc::new(StatementBuilder::new(&columns, self.delimiters()).insert(|column| {
            descriptor
                .property(column.property)
                .is_some_and(|property| !property.read(object).is_null())
        }));
        debug_log!("insert for {}: {}", T::type_name(), insert.statement.sql);

        if columns.has_defaults() {
            return Ok(insert);
        }
        Ok(self.inserts.insert(TypeId::of::<T>(), insert))
    }

    /// Update statement for `object`
    ///
    /// Change-tracked objects set only the columns whose properties differ
    /// from the last read state and are never cached. Other types set every
    /// non-key column with one cached statement.
    pub fn update_statement<T: Entity>(
        &self,
        object: &T,
        connection: &mut dyn Connection,
    ) -> Result<UpdateStatement, MappingError> {
        let columns = self.columns_of::<T>(connection)?;
        let builder = StatementBuilder::new(&columns, self.delimiters());

        if T::is_change_tracked() {
            let descriptor = self.descriptor::<T>();
            let changed = changed_properties(object, &descriptor);
            return builder.update(|column| changed.contains(&column.property));
        }

        if let Some(statement) = self.updates.get(&TypeId::of::<T>()) {
            return Ok(UpdateStatement::Changed(statement));
        }
        match builder.update(|_| true)? {
            UpdateStatement::Changed(statement) => Ok(UpdateStatement::Changed(
                self.updates.insert(TypeId::of::<T>(), statement),
            )),
            UpdateStatement::NoChangesDetected => Ok(UpdateStatement::NoChangesDetected),
        }
    }
}
