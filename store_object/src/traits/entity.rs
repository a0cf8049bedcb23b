//! Entity capability descriptors
//!
//! A mapped type describes itself once through [`Entity::describe`]: an
//! ordered list of properties, each with an optional reader, an optional
//! writer and the declarative hints attached to it. Everything downstream
//! works from this descriptor.

use type_mapping::{ConversionError, PropertyType, Value};

use crate::change_tracker::Snapshot;

pub type Reader<T> = fn(&T) -> Value;
pub type Writer<T> = fn(&mut T, Value) -> Result<(), ConversionError>;

/// Metadata about a mapped type
/// This trait should be derived using `#[derive(Entity)]` or the `#[model]`
/// attribute macro.
///
/// ```ignore
/// use rowbind::prelude::*;
///
/// #[model]
/// #[table(name = "Orders")]
/// pub struct Order {
///     #[primary_key]
///     #[auto_increment]
///     pub id: i64,
///
///     pub name: String,
///
///     #[has_default]
///     pub created: Option<NaiveDateTime>,
/// }
/// ```
pub trait Entity: Sized + 'static {
    /// Bare type name, the starting point of table name guesses
    fn type_name() -> &'static str;

    /// Explicit table name
    fn table_hint() -> Option<&'static str> {
        None
    }

    /// Query-result types map to result labels instead of a table
    fn is_query_result() -> bool {
        false
    }

    /// Types carrying a [`Snapshot`] get minimal, change-based updates
    fn is_change_tracked() -> bool {
        false
    }

    fn describe() -> EntityDescriptor<Self>;

    fn snapshot(&self) -> Option<&Snapshot> {
        None
    }

    fn snapshot_mut(&mut self) -> Option<&mut Snapshot> {
        None
    }
}

/// Declarative mapping hints for one property
///
/// `None` means "not hinted"; discovery fills those from the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnHints {
    pub column: Option<&'static str>,
    pub primary: Option<bool>,
    pub auto_increment: Option<bool>,
    pub has_default: Option<bool>,
    pub not_column: bool,
}

impl ColumnHints {
    /// Merge accessor-level hints over field-level ones; the accessor wins
    pub fn overlay(self, accessor: ColumnHints) -> ColumnHints {
        ColumnHints {
            column: accessor.column.or(self.column),
            primary: accessor.primary.or(self.primary),
            auto_increment: accessor.auto_increment.or(self.auto_increment),
            has_default: accessor.has_default.or(self.has_default),
            not_column: self.not_column || accessor.not_column,
        }
    }
}

pub struct PropertyDescriptor<T> {
    pub name: &'static str,
    pub property_type: PropertyType,
    pub nullable: bool,
    pub reader: Option<Reader<T>>,
    /// `None` marks a derived, read-only property
    pub writer: Option<Writer<T>>,
    pub hints: ColumnHints,
}

impl<T> Clone for PropertyDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            property_type: self.property_type,
            nullable: self.nullable,
            reader: self.reader,
            writer: self.writer,
            hints: self.hints,
        }
    }
}

impl<T> std::fmt::Debug for PropertyDescriptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("property_type", &self.property_type)
            .field("nullable", &self.nullable)
            .field("readable", &self.reader.is_some())
            .field("writable", &self.writer.is_some())
            .field("hints", &self.hints)
            .finish()
    }
}

impl<T> PropertyDescriptor<T> {
    /// Properties that take part in column mapping and statements
    pub fn is_mappable(&self) -> bool {
        !self.hints.not_column && self.reader.is_some() && self.writer.is_some()
    }

    pub fn read(&self, object: &T) -> Value {
        match self.reader {
            Some(reader) => reader(object),
            None => Value::Null,
        }
    }

    pub fn write(&self, object: &mut T, value: Value) -> Result<(), ConversionError> {
        match self.writer {
            Some(writer) => writer(object, value),
            None => Ok(()),
        }
    }
}

/// Ordered property set of a type, built once and then frozen
pub struct EntityDescriptor<T> {
    type_name: &'static str,
    properties: Vec<PropertyDescriptor<T>>,
}

impl<T> std::fmt::Debug for EntityDescriptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("type_name", &self.type_name)
            .field("properties", &self.properties)
            .finish()
    }
}

impl<T> EntityDescriptor<T> {
    /// Build a descriptor; a later property with the same (case-insensitive)
    /// name is merged into the earlier one, its hints taking precedence
    pub fn new(type_name: &'static str, properties: Vec<PropertyDescriptor<T>>) -> Self {
        let mut merged: Vec<PropertyDescriptor<T>> = Vec::with_capacity(properties.len());
        for property in properties {
            match merged
                .iter_mut()
                .find(|existing| existing.name.eq_ignore_ascii_case(property.name))
            {
                Some(existing) => {
                    existing.hints = existing.hints.overlay(property.hints);
                    existing.reader = property.reader.or(existing.reader);
                    existing.writer = property.writer.or(existing.writer);
                }
                None => merged.push(property),
            }
        }

        Self {
            type_name,
            properties: merged,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn properties(&self) -> &[PropertyDescriptor<T>] {
        &self.properties
    }

    pub fn property(&self, index: usize) -> Option<&PropertyDescriptor<T>> {
        self.properties.get(index)
    }

    /// Property position by case-insensitive name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.properties
            .iter()
            .position(|property| property.name.eq_ignore_ascii_case(name))
    }

    pub fn find(&self, name: &str) -> Option<&PropertyDescriptor<T>> {
        self.position(name).and_then(|index| self.properties.get(index))
    }

    /// Positions of the properties that map to columns
    pub fn mappable(&self) -> impl Iterator<Item = usize> + '_ {
        self.properties
            .iter()
            .enumerate()
            .filter(|(_, property)| property.is_mappable())
            .map(|(index, _)| index)
    }
}
