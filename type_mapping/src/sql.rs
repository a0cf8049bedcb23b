//! SQL type classification
//!
//! This module maps driver-reported type codes and native type names onto the
//! closed set of [`SemanticType`] kinds the coercion engine dispatches on.

use std::fmt;

use serde::Serialize;

/// X/Open SQL type codes, as reported by JDBC/ODBC-style catalogs
pub mod type_codes {
    pub const BIT: i32 = -7;
    pub const TINYINT: i32 = -6;
    pub const SMALLINT: i32 = 5;
    pub const INTEGER: i32 = 4;
    pub const BIGINT: i32 = -5;
    pub const FLOAT: i32 = 6;
    pub const REAL: i32 = 7;
    pub const DOUBLE: i32 = 8;
    pub const NUMERIC: i32 = 2;
    pub const DECIMAL: i32 = 3;
    pub const CHAR: i32 = 1;
    pub const VARCHAR: i32 = 12;
    pub const LONGVARCHAR: i32 = -1;
    pub const NCHAR: i32 = -15;
    pub const NVARCHAR: i32 = -9;
    pub const LONGNVARCHAR: i32 = -16;
    pub const DATE: i32 = 91;
    pub const TIME: i32 = 92;
    pub const TIMESTAMP: i32 = 93;
    pub const TIMESTAMP_WITH_TIMEZONE: i32 = 2014;
    pub const BINARY: i32 = -2;
    pub const VARBINARY: i32 = -3;
    pub const LONGVARBINARY: i32 = -4;
    pub const BLOB: i32 = 2004;
    pub const CLOB: i32 = 2005;
    pub const NCLOB: i32 = 2011;
    pub const BOOLEAN: i32 = 16;
    pub const OTHER: i32 = 1111;
}

/// Driver-independent classification of a column's value domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SemanticType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal,
    Char,
    VarChar,
    LongVarChar,
    Clob,
    Binary,
    Blob,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Uuid,
    Json,
}

impl SemanticType {
    /// Kinds a database can generate values for (sequences, identities)
    pub fn is_countable(&self) -> bool {
        matches!(
            self,
            SemanticType::TinyInt
                | SemanticType::SmallInt
                | SemanticType::Integer
                | SemanticType::BigInt
                | SemanticType::Decimal
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, SemanticType::Real | SemanticType::Double)
    }

    pub fn from_type_code(code: i32) -> Option<Self> {
        use type_codes::*;

        let kind = match code {
            BIT | BOOLEAN => SemanticType::Boolean,
            TINYINT => SemanticType::TinyInt,
            SMALLINT => SemanticType::SmallInt,
            INTEGER => SemanticType::Integer,
            BIGINT => SemanticType::BigInt,
            REAL => SemanticType::Real,
            FLOAT | DOUBLE => SemanticType::Double,
            NUMERIC | DECIMAL => SemanticType::Decimal,
            CHAR | NCHAR => SemanticType::Char,
            VARCHAR | NVARCHAR => SemanticType::VarChar,
            LONGVARCHAR | LONGNVARCHAR => SemanticType::LongVarChar,
            CLOB | NCLOB => SemanticType::Clob,
            BINARY | VARBINARY | LONGVARBINARY => SemanticType::Binary,
            BLOB => SemanticType::Blob,
            DATE => SemanticType::Date,
            TIME => SemanticType::Time,
            TIMESTAMP => SemanticType::Timestamp,
            TIMESTAMP_WITH_TIMEZONE => SemanticType::TimestampTz,
            _ => return None,
        };
        Some(kind)
    }

    /// Map a native type name (`int8`, `varchar(30)`, `uuid`, ...) to a kind
    pub fn from_type_name(name: &str) -> Option<Self> {
        // Size and precision suffixes do not change the kind
        let base = name.split('(').next().unwrap_or(name).trim().to_ascii_lowercase();
        let kind = match base.as_str() {
            "bool" | "boolean" | "bit" => SemanticType::Boolean,
            "tinyint" => SemanticType::TinyInt,
            "smallint" | "int2" | "smallserial" => SemanticType::SmallInt,
            "int" | "integer" | "int4" | "mediumint" | "serial" | "counter" | "autoincrement" => {
                SemanticType::Integer
            }
            "bigint" | "int8" | "bigserial" | "long" => SemanticType::BigInt,
            "real" | "float4" => SemanticType::Real,
            "float" | "float8" | "double" | "double precision" => SemanticType::Double,
            "numeric" | "decimal" | "number" | "money" => SemanticType::Decimal,
            "char" | "character" | "nchar" | "bpchar" => SemanticType::Char,
            "varchar" | "character varying" | "nvarchar" | "varchar2" | "nvarchar2"
            | "varchar_ignorecase" => SemanticType::VarChar,
            "text" | "ntext" | "mediumtext" | "longtext" | "longvarchar" => {
                SemanticType::LongVarChar
            }
            "clob" | "nclob" => SemanticType::Clob,
            "binary" | "varbinary" | "bytea" | "raw" => SemanticType::Binary,
            "blob" | "longblob" | "image" => SemanticType::Blob,
            "date" => SemanticType::Date,
            "time" => SemanticType::Time,
            "timestamp" | "datetime" | "datetime2" | "smalldatetime" => SemanticType::Timestamp,
            "timestamptz" | "timestamp with time zone" | "datetimeoffset" => {
                SemanticType::TimestampTz
            }
            "uuid" | "uniqueidentifier" | "guid" => SemanticType::Uuid,
            "json" | "jsonb" => SemanticType::Json,
            _ => return None,
        };
        Some(kind)
    }

    /// Resolve a kind from whatever the driver reported, preferring the code
    pub fn resolve(code: Option<i32>, name: Option<&str>) -> Option<Self> {
        code.and_then(Self::from_type_code)
            .or_else(|| name.and_then(Self::from_type_name))
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
