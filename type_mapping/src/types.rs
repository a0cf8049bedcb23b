//! Type mapping definitions
//!
//! This module provides the runtime [`Value`] exchanged with drivers, the
//! declared [`PropertyType`] of a mapped property and the [`FieldType`] trait
//! binding concrete Rust field types to both.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::ConversionError;

/// Driver-native and property values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    /// Fully drained large character object
    Clob(String),
    Blob(Vec<u8>),
    /// Enumeration constant, by name
    Enum(String),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the runtime kind, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Uuid(_) => "uuid",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Clob(_) => "clob",
            Value::Blob(_) => "blob",
            Value::Enum(_) => "enum",
            Value::Json(_) => "json",
        }
    }

    /// True when the value is already in the exact shape `target` expects
    pub fn matches(&self, target: &PropertyType) -> bool {
        matches!(
            (self, target),
            (Value::Bool(_), PropertyType::Bool)
                | (Value::I16(_), PropertyType::I16)
                | (Value::I32(_), PropertyType::I32)
                | (Value::I64(_), PropertyType::I64)
                | (Value::F32(_), PropertyType::F32)
                | (Value::F64(_), PropertyType::F64)
                | (Value::Decimal(_), PropertyType::Decimal)
                | (Value::Text(_), PropertyType::String)
                | (Value::Bytes(_), PropertyType::Bytes)
                | (Value::Uuid(_), PropertyType::Uuid)
                | (Value::Timestamp(_), PropertyType::DateTime)
                | (Value::TimestampTz(_), PropertyType::DateTimeUtc)
                | (Value::Date(_), PropertyType::Date)
                | (Value::Time(_), PropertyType::Time)
                | (Value::Enum(_), PropertyType::Enum(_))
                | (Value::Json(_), PropertyType::Json)
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Text(v) | Value::Clob(v) | Value::Enum(v) => f.write_str(v),
            Value::Bytes(v) | Value::Blob(v) => write!(f, "<{} bytes>", v.len()),
            Value::Uuid(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "{}", v),
            Value::TimestampTz(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v),
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

/// Declared type of a mapped property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    Decimal,
    String,
    Uuid,
    /// `chrono::NaiveDateTime`
    DateTime,
    /// `chrono::DateTime<Utc>`
    DateTimeUtc,
    Date,
    Time,
    Bytes,
    Json,
    /// Unit enumeration with the given constant names
    Enum(&'static [&'static str]),
}

impl PropertyType {
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            PropertyType::DateTime | PropertyType::DateTimeUtc | PropertyType::Date | PropertyType::Time
        )
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, PropertyType::I16 | PropertyType::I32 | PropertyType::I64)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyType::Bool => "bool",
            PropertyType::I16 => "i16",
            PropertyType::I32 => "i32",
            PropertyType::I64 => "i64",
            PropertyType::F32 => "f32",
            PropertyType::F64 => "f64",
            PropertyType::Decimal => "Decimal",
            PropertyType::String => "String",
            PropertyType::Uuid => "Uuid",
            PropertyType::DateTime => "NaiveDateTime",
            PropertyType::DateTimeUtc => "DateTime<Utc>",
            PropertyType::Date => "NaiveDate",
            PropertyType::Time => "NaiveTime",
            PropertyType::Bytes => "Vec<u8>",
            PropertyType::Json => "serde_json::Value",
            PropertyType::Enum(names) => return write!(f, "enum {{{}}}", names.join(", ")),
        };
        f.write_str(name)
    }
}

/// Binding between a Rust field type and the value model
///
/// `from_value` expects a value already coerced to [`FieldType::PROPERTY_TYPE`];
/// cross-kind conversion is the job of [`crate::Coercer`].
pub trait FieldType: Sized {
    const PROPERTY_TYPE: PropertyType;
    const NULLABLE: bool = false;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, ConversionError>;

    /// Write `value` into `slot`. A null never overwrites a non-nullable field.
    fn assign(slot: &mut Self, value: Value) -> Result<(), ConversionError> {
        if value.is_null() && !Self::NULLABLE {
            return Ok(());
        }
        *slot = Self::from_value(value)?;
        Ok(())
    }
}

fn mismatch(expected: PropertyType, found: &Value) -> ConversionError {
    ConversionError::TypeMismatch {
        expected,
        found: found.kind_name(),
    }
}

macro_rules! impl_field_type {
    ($ty:ty, $prop:ident, $variant:ident) => {
        impl FieldType for $ty {
            const PROPERTY_TYPE: PropertyType = PropertyType::$prop;

            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }

            fn from_value(value: Value) -> Result<Self, ConversionError> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(mismatch(Self::PROPERTY_TYPE, &other)),
                }
            }
        }

        impl From<$ty> for Value {
            fn from(val: $ty) -> Self {
                Value::$variant(val)
            }
        }
    };
}

impl_field_type!(bool, Bool, Bool);
impl_field_type!(i16, I16, I16);
impl_field_type!(i32, I32, I32);
impl_field_type!(i64, I64, I64);
impl_field_type!(f32, F32, F32);
impl_field_type!(f64, F64, F64);
impl_field_type!(Decimal, Decimal, Decimal);
impl_field_type!(Uuid, Uuid, Uuid);
impl_field_type!(NaiveDateTime, DateTime, Timestamp);
impl_field_type!(DateTime<Utc>, DateTimeUtc, TimestampTz);
impl_field_type!(NaiveDate, Date, Date);
impl_field_type!(NaiveTime, Time, Time);
impl_field_type!(serde_json::Value, Json, Json);

impl FieldType for String {
    const PROPERTY_TYPE: PropertyType = PropertyType::String;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(v) | Value::Clob(v) | Value::Enum(v) => Ok(v),
            other => Err(mismatch(Self::PROPERTY_TYPE, &other)),
        }
    }
}

impl FieldType for Vec<u8> {
    const PROPERTY_TYPE: PropertyType = PropertyType::Bytes;

    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bytes(v) | Value::Blob(v) => Ok(v),
            other => Err(mismatch(Self::PROPERTY_TYPE, &other)),
        }
    }
}

impl<T: FieldType> FieldType for Option<T> {
    const PROPERTY_TYPE: PropertyType = T::PROPERTY_TYPE;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl From<String> for Value {
    fn from(val: String) -> Self {
        Value::Text(val)
    }
}

impl From<&str> for Value {
    fn from(val: &str) -> Self {
        Value::Text(val.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(val: Vec<u8>) -> Self {
        Value::Bytes(val)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(val: Option<T>) -> Self {
        match val {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_round_trips_null() {
        let none: Option<i32> = None;
        assert_eq!(none.to_value(), Value::Null);
        assert_eq!(Option::<i32>::from_value(Value::Null).unwrap(), None);
        assert_eq!(Option::<i32>::from_value(Value::I32(7)).unwrap(), Some(7));
    }

    #[test]
    fn test_null_does_not_overwrite_required_field() {
        let mut count = 5i32;
        i32::assign(&mut count, Value::Null).unwrap();
        assert_eq!(count, 5);

        let mut maybe = Some(5i32);
        Option::<i32>::assign(&mut maybe, Value::Null).unwrap();
        assert_eq!(maybe, None);
    }

    #[test]
    fn test_string_accepts_clob_and_enum_payloads() {
        assert_eq!(String::from_value(Value::Clob("long".into())).unwrap(), "long");
        assert_eq!(String::from_value(Value::Enum("Active".into())).unwrap(), "Active");
    }

    #[test]
    fn test_mismatch_reports_kinds() {
        let err = i32::from_value(Value::Text("x".into())).unwrap_err();
        assert_eq!(
            err,
            ConversionError::TypeMismatch {
                expected: PropertyType::I32,
                found: "text"
            }
        );
    }

    #[test]
    fn test_value_matches_target() {
        assert!(Value::I64(1).matches(&PropertyType::I64));
        assert!(!Value::I64(1).matches(&PropertyType::I32));
        assert!(Value::Enum("A".into()).matches(&PropertyType::Enum(&["A"])));
        assert!(!Value::Text("A".into()).matches(&PropertyType::Enum(&["A"])));
    }

    #[test]
    fn test_enum_property_type_display() {
        assert_eq!(
            PropertyType::Enum(&["Open", "Closed"]).to_string(),
            "enum {Open, Closed}"
        );
    }
}
