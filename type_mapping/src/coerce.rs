//! Bidirectional value coercion
//!
//! This module converts driver values read from result columns into the exact
//! property type a field declares (`coerce_in`), and converts property values
//! into bindable driver values for write statements (`coerce_out`).
//!
//! Conversion is a dispatch on (runtime value kind, target property type).
//! Lossy narrowing and truncation log a warning and carry on unless the
//! coercer runs in strict mode. Null is never coerced.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::io::{Cursor, Read};
use tracing::warn;
use uuid::Uuid;

use crate::errors::ConversionError;
use crate::sql::SemanticType;
use crate::types::{PropertyType, Value};

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATE_ONLY_FORMAT: &str = "%Y-%m-%d";
const TIME_ONLY_FORMAT: &str = "%H:%M:%S";

/// Positional, typed access to the current row of a driver result
pub trait ColumnSource {
    /// Generic accessor
    fn get_object(&self, index: usize) -> Result<Value, ConversionError>;

    /// Timestamp accessor
    fn get_timestamp(&self, index: usize) -> Result<Value, ConversionError> {
        self.get_object(index)
    }

    /// Large character object accessor, `None` for null
    fn get_character_stream(
        &self,
        index: usize,
    ) -> Result<Option<Box<dyn Read + '_>>, ConversionError> {
        match self.get_object(index)? {
            Value::Null => Ok(None),
            Value::Clob(text) | Value::Text(text) => Ok(Some(Box::new(Cursor::new(text.into_bytes())))),
            Value::Blob(bytes) | Value::Bytes(bytes) => Ok(Some(Box::new(Cursor::new(bytes)))),
            other => Ok(Some(Box::new(Cursor::new(other.to_string().into_bytes())))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoercionOptions {
    /// Fail instead of warning on truncation and numeric narrowing
    pub strict: bool,
    /// chrono format for string to date/time conversion
    pub date_format: String,
}

impl Default for CoercionOptions {
    fn default() -> Self {
        Self {
            strict: false,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Coercer {
    options: CoercionOptions,
}

impl Coercer {
    pub fn new(options: CoercionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CoercionOptions {
        &self.options
    }

    /// Read column `index` of the current row and convert it to `target`
    ///
    /// `kind` is the semantic kind derived from the column's type code; `None`
    /// means the driver reported a type nobody recognises, in which case the raw
    /// value is returned untouched.
    pub fn read_value(
        &self,
        source: &dyn ColumnSource,
        index: usize,
        kind: Option<SemanticType>,
        column: &str,
        target: &PropertyType,
    ) -> Result<Value, ConversionError> {
        // No column type code reliably identifies a uuid
        let kind = if *target == PropertyType::Uuid {
            Some(SemanticType::Uuid)
        } else {
            kind
        };

        let Some(kind) = kind else {
            let raw = source.get_object(index)?;
            if !raw.is_null() {
                warn!(
                    column = column,
                    source_kind = raw.kind_name(),
                    target = %target,
                    value = %raw,
                    "Unrecognised column type, returning driver value unchanged"
                );
            }
            return Ok(raw);
        };

        let raw = match kind {
            SemanticType::Timestamp | SemanticType::TimestampTz => source.get_timestamp(index)?,
            SemanticType::Clob => match source.get_character_stream(index)? {
                Some(mut reader) => {
                    let mut text = String::new();
                    reader
                        .read_to_string(&mut text)
                        .map_err(|e| ConversionError::Source {
                            column: column.to_string(),
                            message: e.to_string(),
                        })?;
                    Value::Clob(text)
                }
                None => Value::Null,
            },
            SemanticType::Real | SemanticType::Double => {
                extract_float(source.get_object(index)?, target, column)?
            }
            _ => source.get_object(index)?,
        };

        self.coerce_in(raw, target, column)
    }

    /// Convert a driver value into the shape `target` declares
    pub fn coerce_in(
        &self,
        raw: Value,
        target: &PropertyType,
        column: &str,
    ) -> Result<Value, ConversionError> {
        use PropertyType as P;

        let converted = match (raw, target) {
            (Value::Null, _) => Value::Null,
            // enum names are still checked against the declared constants
            (value, t) if value.matches(t) && !matches!(t, P::Enum(_)) => value,

            // integral kinds
            (Value::I16(n), P::Bool) => Value::Bool(n != 0),
            (Value::I32(n), P::Bool) => Value::Bool(n != 0),
            (Value::I64(n), P::Bool) => Value::Bool(n != 0),
            (Value::I16(n), P::I32) => Value::I32(n.into()),
            (Value::I16(n), P::I64) => Value::I64(n.into()),
            (Value::I32(n), P::I64) => Value::I64(n.into()),
            (Value::I32(n), P::I16) => self.narrowed(
                column,
                "i32",
                &n,
                target,
                i16::try_from(n).is_ok(),
                Value::I16(n as i16),
            )?,
            (Value::I64(n), P::I32) => self.narrowed(
                column,
                "i64",
                &n,
                target,
                i32::try_from(n).is_ok(),
                Value::I32(n as i32),
            )?,
            (Value::I64(n), P::I16) => self.narrowed(
                column,
                "i64",
                &n,
                target,
                i16::try_from(n).is_ok(),
                Value::I16(n as i16),
            )?,
            (Value::I16(n), P::F32) => Value::F32(n.into()),
            (Value::I16(n), P::F64) => Value::F64(n.into()),
            (Value::I32(n), P::F32) => Value::F32(n as f32),
            (Value::I32(n), P::F64) => Value::F64(n.into()),
            (Value::I64(n), P::F32) => Value::F32(n as f32),
            (Value::I64(n), P::F64) => Value::F64(n as f64),
            (Value::I16(n), P::Decimal) => Value::Decimal(n.into()),
            (Value::I32(n), P::Decimal) => Value::Decimal(n.into()),
            (Value::I64(n), P::Decimal) => Value::Decimal(n.into()),
            (Value::I32(n), P::String) => Value::Text(n.to_string()),
            (Value::I64(n), P::String) => Value::Text(n.to_string()),

            // 64-bit integers hold epoch milliseconds
            (Value::I64(ms), t) if t.is_temporal() => from_epoch_millis(ms, target)?,

            // floating point
            (Value::F32(f), P::F64) => Value::F64(f.into()),
            (Value::F32(f), t) => self.coerce_in(Value::F64(f.into()), t, column)?,
            (Value::F64(f), P::Decimal) => {
                Value::Decimal(Decimal::try_from(f).map_err(|e| ConversionError::Parse {
                    value: f.to_string(),
                    target: *target,
                    reason: e.to_string(),
                })?)
            }
            (Value::F64(f), P::F32) => {
                self.narrowed(column, "f64", &f, target, fits_f32(f), Value::F32(f as f32))?
            }
            (Value::F64(f), P::I64) => self.truncated_float(column, f, target, i64::MIN as f64, i64::MAX as f64, Value::I64(f as i64))?,
            (Value::F64(f), P::I32) => self.truncated_float(column, f, target, i32::MIN.into(), i32::MAX.into(), Value::I32(f as i32))?,
            (Value::F64(f), P::I16) => self.truncated_float(column, f, target, i16::MIN.into(), i16::MAX.into(), Value::I16(f as i16))?,

            // exact decimal
            (Value::Decimal(d), P::F32) => Value::F32(d.to_f32().unwrap_or(f32::NAN)),
            (Value::Decimal(d), P::F64) => Value::F64(d.to_f64().unwrap_or(f64::NAN)),
            (Value::Decimal(d), P::Bool) => Value::Bool(d.trunc() == Decimal::ONE),
            (Value::Decimal(d), P::I64) => {
                let whole = d.trunc();
                let fits = whole == d && whole.to_i64().is_some();
                self.narrowed(column, "decimal", &d, target, fits, Value::I64(whole.to_i64().unwrap_or_default()))?
            }
            (Value::Decimal(d), P::I32) => {
                let whole = d.trunc();
                let fits = whole == d && whole.to_i32().is_some();
                self.narrowed(column, "decimal", &d, target, fits, Value::I32(whole.to_i32().unwrap_or_default()))?
            }
            (Value::Decimal(d), P::I16) => {
                let whole = d.trunc();
                let fits = whole == d && whole.to_i16().is_some();
                self.narrowed(column, "decimal", &d, target, fits, Value::I16(whole.to_i16().unwrap_or_default()))?
            }
            (Value::Decimal(d), P::String) => Value::Text(d.to_string()),

            // character data
            (Value::Clob(text), P::String) => Value::Text(text),
            (Value::Enum(name), P::String) => Value::Text(name),
            (Value::Text(text) | Value::Clob(text), t) if t.is_temporal() => {
                self.parse_temporal(&text, target)?
            }
            (Value::Text(text), P::Enum(names)) => {
                let found = names.iter().find(|name| name.eq_ignore_ascii_case(text.trim()));
                match found {
                    Some(name) => Value::Enum((*name).to_string()),
                    None => {
                        return Err(ConversionError::UnknownVariant {
                            value: text,
                            target: *target,
                        })
                    }
                }
            }
            (Value::Enum(name), P::Enum(names)) => {
                match names.iter().find(|candidate| candidate.eq_ignore_ascii_case(&name)) {
                    Some(candidate) => Value::Enum((*candidate).to_string()),
                    None => {
                        return Err(ConversionError::UnknownVariant {
                            value: name,
                            target: *target,
                        })
                    }
                }
            }
            (Value::Text(text), P::Uuid) => Value::Uuid(Uuid::parse_str(text.trim()).map_err(|e| {
                ConversionError::Parse {
                    value: text.clone(),
                    target: *target,
                    reason: e.to_string(),
                }
            })?),
            (Value::Text(text) | Value::Clob(text), P::Json) => {
                Value::Json(serde_json::from_str(&text).map_err(|e| ConversionError::Parse {
                    value: text.clone(),
                    target: *target,
                    reason: e.to_string(),
                })?)
            }
            (Value::Text(text), P::Decimal) => {
                Value::Decimal(text.trim().parse::<Decimal>().map_err(|e| ConversionError::Parse {
                    value: text.clone(),
                    target: *target,
                    reason: e.to_string(),
                })?)
            }
            (Value::Json(json), P::String) => Value::Text(json.to_string()),

            // binary
            (Value::Blob(bytes), P::Bytes) => Value::Bytes(bytes),
            (Value::Bytes(bytes) | Value::Blob(bytes), P::Uuid) => {
                Value::Uuid(Uuid::from_slice(&bytes).map_err(|e| ConversionError::Parse {
                    value: format!("<{} bytes>", bytes.len()),
                    target: *target,
                    reason: e.to_string(),
                })?)
            }

            // temporal
            (Value::Timestamp(ts), P::DateTimeUtc) => Value::TimestampTz(Utc.from_utc_datetime(&ts)),
            (Value::Timestamp(ts), P::Date) => Value::Date(ts.date()),
            (Value::Timestamp(ts), P::Time) => Value::Time(ts.time()),
            (Value::Timestamp(ts), P::I64) => Value::I64(ts.and_utc().timestamp_millis()),
            (Value::TimestampTz(ts), P::DateTime) => Value::Timestamp(ts.naive_utc()),
            (Value::TimestampTz(ts), P::Date) => Value::Date(ts.date_naive()),
            (Value::TimestampTz(ts), P::Time) => Value::Time(ts.time()),
            (Value::TimestampTz(ts), P::I64) => Value::I64(ts.timestamp_millis()),
            (Value::Date(date), P::DateTime) => Value::Timestamp(date.and_time(NaiveTime::default())),
            (Value::Date(date), P::DateTimeUtc) => {
                Value::TimestampTz(Utc.from_utc_datetime(&date.and_time(NaiveTime::default())))
            }

            (raw, _) => {
                return Err(ConversionError::TypeMismatch {
                    expected: *target,
                    found: raw.kind_name(),
                })
            }
        };

        Ok(converted)
    }

    /// Convert a property value into a bindable driver value
    ///
    /// `length` is the column's display length; text longer than a known,
    /// positive length is cut to exactly that many characters.
    pub fn coerce_out(
        &self,
        value: Value,
        column: &str,
        length: Option<usize>,
    ) -> Result<Value, ConversionError> {
        let bound = match value {
            Value::Enum(name) => Value::Text(name),
            Value::TimestampTz(ts) => Value::Timestamp(ts.naive_utc()),
            Value::Date(date) => Value::Timestamp(date.and_time(NaiveTime::default())),
            Value::Time(time) => Value::Timestamp(NaiveDate::default().and_time(time)),
            Value::Text(text) => Value::Text(self.truncate(text, column, length)?),
            other => other,
        };
        Ok(bound)
    }

    fn truncate(
        &self,
        text: String,
        column: &str,
        length: Option<usize>,
    ) -> Result<String, ConversionError> {
        let Some(limit) = length.filter(|limit| *limit > 0) else {
            return Ok(text);
        };
        let actual = text.chars().count();
        if actual <= limit {
            return Ok(text);
        }
        if self.options.strict {
            return Err(ConversionError::Truncation {
                column: column.to_string(),
                length: limit,
                actual,
            });
        }

        warn!(
            column = column,
            length = limit,
            actual = actual,
            value = %text,
            "Truncation with column {}: value exceeds the column length {}",
            column,
            limit
        );
        Ok(text.chars().take(limit).collect())
    }

    fn narrowed(
        &self,
        column: &str,
        source_kind: &'static str,
        value: &dyn std::fmt::Display,
        target: &PropertyType,
        fits: bool,
        narrowed: Value,
    ) -> Result<Value, ConversionError> {
        if fits {
            return Ok(narrowed);
        }
        if self.options.strict {
            return Err(ConversionError::Overflow {
                column: column.to_string(),
                value: value.to_string(),
                source_kind,
                target: *target,
            });
        }

        warn!(
            column = column,
            source_kind = source_kind,
            target = %target,
            value = %value,
            narrowed = %narrowed,
            "Possible overflow: {} value does not fit {}",
            source_kind,
            target
        );
        Ok(narrowed)
    }

    fn truncated_float(
        &self,
        column: &str,
        value: f64,
        target: &PropertyType,
        min: f64,
        max: f64,
        narrowed: Value,
    ) -> Result<Value, ConversionError> {
        let fits = value.fract() == 0.0 && value >= min && value <= max;
        self.narrowed(column, "f64", &value, target, fits, narrowed)
    }

    fn parse_temporal(&self, text: &str, target: &PropertyType) -> Result<Value, ConversionError> {
        let text = text.trim();
        let format = self.options.date_format.as_str();
        let parse_error = |reason: String| ConversionError::Parse {
            value: text.to_string(),
            target: *target,
            reason,
        };
        let full = NaiveDateTime::parse_from_str(text, format);

        let value = match target {
            PropertyType::DateTime => Value::Timestamp(full.map_err(|e| parse_error(e.to_string()))?),
            PropertyType::DateTimeUtc => Value::TimestampTz(
                full.map_err(|e| parse_error(e.to_string()))?.and_utc(),
            ),
            PropertyType::Date => match NaiveDate::parse_from_str(text, DATE_ONLY_FORMAT) {
                Ok(date) => Value::Date(date),
                Err(_) => Value::Date(full.map_err(|e| parse_error(e.to_string()))?.date()),
            },
            PropertyType::Time => match NaiveTime::parse_from_str(text, TIME_ONLY_FORMAT) {
                Ok(time) => Value::Time(time),
                Err(_) => Value::Time(full.map_err(|e| parse_error(e.to_string()))?.time()),
            },
            _ => return Err(parse_error("not a temporal target".to_string())),
        };
        Ok(value)
    }
}

/// Whether `f` survives conversion to `f32` without overflowing or flushing to zero
fn fits_f32(f: f64) -> bool {
    if !f.is_finite() || f == 0.0 {
        return true;
    }
    let narrowed = f as f32;
    narrowed.is_finite() && narrowed != 0.0
}

/// Pick the float representation from the target rather than the column
///
/// Single precision targets keep the `f64` so narrowing is checked later.
fn extract_float(
    raw: Value,
    target: &PropertyType,
    column: &str,
) -> Result<Value, ConversionError> {
    let as_f64 = match raw {
        Value::F64(f) => f,
        Value::F32(f) => f.into(),
        Value::Decimal(d) => d.to_f64().unwrap_or(f64::NAN),
        other => return Ok(other),
    };
    let value = match target {
        PropertyType::Decimal => Value::Decimal(Decimal::try_from(as_f64).map_err(|e| {
            ConversionError::Source {
                column: column.to_string(),
                message: e.to_string(),
            }
        })?),
        _ => Value::F64(as_f64),
    };
    Ok(value)
}

fn from_epoch_millis(ms: i64, target: &PropertyType) -> Result<Value, ConversionError> {
    let ts: DateTime<Utc> =
        DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| ConversionError::Parse {
            value: ms.to_string(),
            target: *target,
            reason: "epoch milliseconds out of range".to_string(),
        })?;
    let value = match target {
        PropertyType::DateTimeUtc => Value::TimestampTz(ts),
        PropertyType::DateTime => Value::Timestamp(ts.naive_utc()),
        PropertyType::Date => Value::Date(ts.date_naive()),
        _ => Value::Time(ts.time()),
    };
    Ok(value)
}
