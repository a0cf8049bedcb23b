//! Column discovery
//!
//! Column descriptors are built from three driver sources, in order: a
//! zero-row projection of the table (labels, order, type codes, display
//! sizes), the catalog's column listing (defaults, auto-increment, reliable
//! types) and the catalog's primary key listing (key order). Declarative
//! hints on the matching property override the first two whenever present.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;
use type_mapping::{debug_log, SemanticType};

use crate::driver::{CatalogColumn, Connection, ResultColumn};
use crate::errors::MappingError;
use crate::metadata::properties::match_property;
use crate::statement_builder::quote;
use crate::traits::{ColumnHints, EntityDescriptor};

/// Immutable description of one mapped column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    /// Column name in the driver's exact case
    pub name: String,
    /// Position of the bound property in the entity descriptor
    pub property: usize,
    pub semantic_type: Option<SemanticType>,
    pub native_type: Option<i32>,
    pub native_type_name: Option<String>,
    pub auto_increment: bool,
    pub primary: bool,
    pub has_default: bool,
    /// Display length, when the driver reports a positive one
    pub length: Option<usize>,
}

impl ColumnDescriptor {
    fn from_projection(column: &ResultColumn, property: usize, hints: &ColumnHints) -> Self {
        let semantic_type = column.semantic_type();
        let provisional = ColumnDescriptor {
            name: column.label.clone(),
            property,
            semantic_type,
            native_type: column.type_code,
            native_type_name: column.type_name.clone(),
            auto_increment: column.auto_increment,
            primary: column.auto_increment,
            has_default: false,
            length: column.display_size.filter(|size| *size > 0),
        };

        ColumnDescriptor {
            auto_increment: hints.auto_increment.unwrap_or(provisional.auto_increment),
            primary: hints.primary.unwrap_or(provisional.primary),
            has_default: hints.has_default.unwrap_or(provisional.has_default),
            ..provisional
        }
    }

    /// Overlay catalog metadata onto flags the hints left open
    fn with_catalog(self, catalog: &CatalogColumn, hints: &ColumnHints) -> Self {
        let has_default = match hints.has_default {
            Some(hinted) => hinted,
            None => self.has_default || catalog.default.is_some(),
        };
        let auto_increment = match hints.auto_increment {
            Some(_) => self.auto_increment,
            None => self.auto_increment || catalog.is_autoincrement.unwrap_or(false),
        };

        match catalog.data_type {
            Some(data_type) => ColumnDescriptor {
                semantic_type: SemanticType::resolve(Some(data_type), catalog.type_name.as_deref()),
                native_type: Some(data_type),
                native_type_name: catalog.type_name.clone().or(self.native_type_name.clone()),
                has_default,
                auto_increment,
                ..self
            },
            None => ColumnDescriptor {
                has_default,
                auto_increment,
                ..self
            },
        }
    }

    /// Enforce that only countable kinds are generated
    fn validated(self) -> Self {
        if self.auto_increment && !self.is_countable() {
            warn!(
                column = %self.name,
                semantic_type = ?self.semantic_type,
                "Column {} reported as auto-increment but is a non-numeric type ({:?}) - treating as not generated",
                self.name,
                self.semantic_type
            );
            return ColumnDescriptor {
                auto_increment: false,
                ..self
            };
        }
        self
    }

    pub fn is_countable(&self) -> bool {
        self.semantic_type.is_some_and(|kind| kind.is_countable())
    }
}

/// Discovered columns of a type's table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableColumns {
    pub table: String,
    /// Mapped columns in projection order
    pub columns: IndexMap<String, ColumnDescriptor>,
    /// Primary key columns in catalog key order
    pub primary_keys: Vec<String>,
}

impl TableColumns {
    pub fn get(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .get(name)
            .or_else(|| self.columns.values().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    pub fn primary_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.primary_keys.iter().filter_map(|name| self.columns.get(name))
    }

    pub fn has_defaults(&self) -> bool {
        self.columns.values().any(|c| c.has_default)
    }

    /// Column name to property position, in column order
    pub fn bindings(&self) -> IndexMap<String, usize> {
        self.columns
            .iter()
            .map(|(name, column)| (name.clone(), column.property))
            .collect()
    }
}

/// Discover the mapped columns of `table` for the type described by `descriptor`
pub fn discover_columns<T>(
    connection: &mut dyn Connection,
    table: &str,
    descriptor: &EntityDescriptor<T>,
    extra_name_characters: &str,
    delimiters: (&str, &str),
) -> Result<TableColumns, MappingError> {
    let sql = format!("SELECT * FROM {} WHERE 1=0", quote(table, delimiters));
    debug_log!("determine columns: {}", sql);

    let projection = connection
        .query(&sql, &[])
        .map_err(|e| MappingError::driver("column discovery", e))?;

    let mut columns: IndexMap<String, ColumnDescriptor> = IndexMap::new();
    for column in &projection.columns {
        let Some(property) = match_property(descriptor, &column.label, extra_name_characters) else {
            continue;
        };
        let hints = descriptor
            .property(property)
            .map(|p| p.hints)
            .unwrap_or_default();
        columns.insert(
            column.label.clone(),
            ColumnDescriptor::from_projection(column, property, &hints),
        );
    }

    let catalog = connection
        .catalog_columns(table)
        .map_err(|e| MappingError::driver("column discovery", e))?;
    for entry in &catalog {
        let Some(key) = find_key(&columns, &entry.name) else {
            continue;
        };
        if let Some(column) = columns.get_mut(&key) {
            let hints = descriptor
                .property(column.property)
                .map(|p| p.hints)
                .unwrap_or_default();
            *column = column.clone().with_catalog(entry, &hints);
        }
    }

    let mut primary_keys = Vec::new();
    let catalog_keys = connection
        .primary_keys(table)
        .map_err(|e| MappingError::driver("primary key discovery", e))?;
    for key_name in &catalog_keys {
        if let Some(key) = find_key(&columns, key_name) {
            if let Some(column) = columns.get_mut(&key) {
                column.primary = true;
            }
            if !primary_keys.contains(&key) {
                primary_keys.push(key);
            }
        }
    }
    // Keys only known from hints or the projection follow the catalog's
    for (name, column) in &columns {
        if column.primary && !primary_keys.contains(name) {
            primary_keys.push(name.clone());
        }
    }

    let columns: IndexMap<String, ColumnDescriptor> = columns
        .into_iter()
        .map(|(name, column)| (name, column.validated()))
        .collect();

    if primary_keys.is_empty() {
        warn!(
            table = table,
            "No primary key found for table {}. Do not use with update/delete/fetch or add a primary key.",
            table
        );
    }
    debug_log!("primary keys for {}: {:?}", table, primary_keys);

    Ok(TableColumns {
        table: table.to_string(),
        columns,
        primary_keys,
    })
}

fn find_key(columns: &IndexMap<String, ColumnDescriptor>, name: &str) -> Option<String> {
    if columns.contains_key(name) {
        return Some(name.to_string());
    }
    columns.keys().find(|key| key.eq_ignore_ascii_case(name)).cloned()
}
