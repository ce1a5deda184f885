//! SQL value types and the destination-affinity coercion table.
//!
//! Rows stream out of the source as [`tiberius::ColumnData`], are decoded into
//! [`SqlValue`], coerced to the destination column's [`Affinity`], and bound
//! into a prepared INSERT via [`rusqlite::ToSql`].

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::{ToSqlOutput, Value as SqliteValue};
use rusqlite::ToSql;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;
use tiberius::{ColumnData, FromSql};
use uuid::Uuid;

use crate::error::{ConvertError, Result};

/// SQL value enum for type-safe row handling.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL. SQLite NULLs are untyped, so no type hint is carried.
    Null,

    /// Boolean value (bit).
    Bool(bool),

    /// 8-bit unsigned integer (tinyint).
    U8(u8),

    /// 16-bit signed integer (smallint).
    I16(i16),

    /// 32-bit signed integer (int).
    I32(i32),

    /// 64-bit signed integer (bigint).
    I64(i64),

    /// 32-bit floating point (real).
    F32(f32),

    /// 64-bit floating point (float).
    F64(f64),

    /// Text/string data.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// UUID/GUID value.
    Uuid(Uuid),

    /// Decimal value with arbitrary precision.
    Decimal(Decimal),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Decode a Tiberius wire value.
    pub fn from_column_data(data: &ColumnData<'static>) -> Result<SqlValue> {
        let value = match data {
            ColumnData::Bit(v) => v.map(SqlValue::Bool),
            ColumnData::U8(v) => v.map(SqlValue::U8),
            ColumnData::I16(v) => v.map(SqlValue::I16),
            ColumnData::I32(v) => v.map(SqlValue::I32),
            ColumnData::I64(v) => v.map(SqlValue::I64),
            ColumnData::F32(v) => v.map(SqlValue::F32),
            ColumnData::F64(v) => v.map(SqlValue::F64),
            ColumnData::String(v) => v.as_ref().map(|s| SqlValue::Text(s.to_string())),
            ColumnData::Guid(v) => v.map(SqlValue::Uuid),
            ColumnData::Binary(v) => v.as_ref().map(|b| SqlValue::Bytes(b.to_vec())),
            ColumnData::Numeric(_) => Decimal::from_sql(data)?.map(SqlValue::Decimal),
            ColumnData::Xml(v) => v.as_ref().map(|x| SqlValue::Text(x.to_string())),
            ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
                NaiveDateTime::from_sql(data)?.map(SqlValue::DateTime)
            }
            ColumnData::Date(_) => NaiveDate::from_sql(data)?.map(SqlValue::Date),
            ColumnData::Time(_) => NaiveTime::from_sql(data)?.map(SqlValue::Time),
            ColumnData::DateTimeOffset(_) => chrono::DateTime::<chrono::Utc>::from_sql(data)?
                .map(|dt| SqlValue::DateTime(dt.naive_utc())),
        };
        Ok(value.unwrap_or(SqlValue::Null))
    }
}

/// Destination type classification used to drive value coercion.
///
/// Encoded as a closed tagged variant; coercion dispatches via a match, never
/// through runtime reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affinity {
    Byte,
    Int16,
    Int32,
    Int64,
    Boolean,
    String,
    Double,
    Single,
    Binary,
    DateTime,
    Guid,
    Object,
}

impl Affinity {
    /// Derive the affinity from an already-normalized column type token.
    ///
    /// An unknown token here indicates a mapper bug: the type map accepted a
    /// token the coercion table does not cover.
    pub fn of(data_type: &str) -> Result<Affinity> {
        let affinity = match data_type {
            "tinyint" => Affinity::Byte,
            "int" => Affinity::Int32,
            "smallint" => Affinity::Int16,
            "bigint" | "integer" => Affinity::Int64,
            "bit" => Affinity::Boolean,
            "nvarchar" | "varchar" | "text" | "ntext" | "nchar" | "char" | "xml" => {
                Affinity::String
            }
            "float" | "numeric" => Affinity::Double,
            "real" => Affinity::Single,
            "blob" => Affinity::Binary,
            "timestamp" | "datetime" | "datetime2" | "date" | "time" => Affinity::DateTime,
            "uniqueidentifier" | "guid" => Affinity::Guid,
            "sql_variant" => Affinity::Object,
            other => return Err(ConvertError::IllegalAffinity(other.to_string())),
        };
        Ok(affinity)
    }
}

/// A value that could not be converted to its destination affinity.
#[derive(Debug, Error)]
#[error("cannot convert {value} to {affinity:?}")]
pub struct CoerceError {
    value: String,
    affinity: Affinity,
}

impl CoerceError {
    fn new(value: &SqlValue, affinity: Affinity) -> Self {
        Self {
            value: format!("{:?}", value),
            affinity,
        }
    }
}

/// Coerce a source value to the destination column's affinity.
///
/// Implements the closed coercion table: listed (value kind, affinity) pairs
/// convert, a NULL stays NULL, and every other pairing passes through
/// unchanged.
pub fn coerce(value: SqlValue, affinity: Affinity) -> std::result::Result<SqlValue, CoerceError> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }

    let err = |v: &SqlValue| CoerceError::new(v, affinity);

    let coerced = match affinity {
        Affinity::Int32 => match value {
            SqlValue::I16(v) => SqlValue::I32(v as i32),
            SqlValue::U8(v) => SqlValue::I32(v as i32),
            SqlValue::I64(v) => {
                SqlValue::I32(i32::try_from(v).map_err(|_| err(&SqlValue::I64(v)))?)
            }
            SqlValue::Decimal(d) => {
                SqlValue::I32(d.to_i32().ok_or_else(|| err(&SqlValue::Decimal(d)))?)
            }
            other => other,
        },
        Affinity::Int16 => match value {
            SqlValue::I32(v) => {
                SqlValue::I16(i16::try_from(v).map_err(|_| err(&SqlValue::I32(v)))?)
            }
            SqlValue::U8(v) => SqlValue::I16(v as i16),
            SqlValue::I64(v) => {
                SqlValue::I16(i16::try_from(v).map_err(|_| err(&SqlValue::I64(v)))?)
            }
            SqlValue::Decimal(d) => {
                SqlValue::I16(d.to_i16().ok_or_else(|| err(&SqlValue::Decimal(d)))?)
            }
            other => other,
        },
        Affinity::Int64 => match value {
            SqlValue::I32(v) => SqlValue::I64(v as i64),
            SqlValue::I16(v) => SqlValue::I64(v as i64),
            SqlValue::U8(v) => SqlValue::I64(v as i64),
            SqlValue::Decimal(d) => {
                SqlValue::I64(d.to_i64().ok_or_else(|| err(&SqlValue::Decimal(d)))?)
            }
            other => other,
        },
        Affinity::Single => match value {
            SqlValue::F64(v) => SqlValue::F32(v as f32),
            SqlValue::Decimal(d) => {
                SqlValue::F32(d.to_f32().ok_or_else(|| err(&SqlValue::Decimal(d)))?)
            }
            other => other,
        },
        Affinity::Double => match value {
            SqlValue::F32(v) => SqlValue::F64(v as f64),
            SqlValue::Decimal(d) => {
                SqlValue::F64(d.to_f64().ok_or_else(|| err(&SqlValue::Decimal(d)))?)
            }
            other => other,
        },
        Affinity::String => match value {
            SqlValue::Uuid(u) => SqlValue::Text(u.to_string()),
            other => other,
        },
        Affinity::Guid => match value {
            SqlValue::Text(s) => {
                let parsed = Uuid::parse_str(s.trim())
                    .map_err(|_| err(&SqlValue::Text(s.clone())))?;
                SqlValue::Uuid(parsed)
            }
            SqlValue::Bytes(b) => SqlValue::Uuid(guid_from_blob(&b)),
            other => other,
        },
        // Binary, Boolean and DateTime affinities accept their values as-is;
        // Byte and Object have no listed conversions.
        Affinity::Byte
        | Affinity::Boolean
        | Affinity::Binary
        | Affinity::DateTime
        | Affinity::Object => value,
    };

    Ok(coerced)
}

/// Interpret a blob as a GUID: exactly 16 bytes are taken directly, longer
/// blobs are truncated to the first 16 bytes, shorter ones zero-padded.
pub fn guid_from_blob(bytes: &[u8]) -> Uuid {
    let mut buf = [0u8; 16];
    let n = bytes.len().min(16);
    buf[..n].copy_from_slice(&bytes[..n]);
    Uuid::from_bytes(buf)
}

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let out = match self {
            SqlValue::Null => ToSqlOutput::Owned(SqliteValue::Null),
            SqlValue::Bool(v) => ToSqlOutput::Owned(SqliteValue::Integer(*v as i64)),
            SqlValue::U8(v) => ToSqlOutput::Owned(SqliteValue::Integer(*v as i64)),
            SqlValue::I16(v) => ToSqlOutput::Owned(SqliteValue::Integer(*v as i64)),
            SqlValue::I32(v) => ToSqlOutput::Owned(SqliteValue::Integer(*v as i64)),
            SqlValue::I64(v) => ToSqlOutput::Owned(SqliteValue::Integer(*v)),
            SqlValue::F32(v) => ToSqlOutput::Owned(SqliteValue::Real(*v as f64)),
            SqlValue::F64(v) => ToSqlOutput::Owned(SqliteValue::Real(*v)),
            SqlValue::Text(v) => ToSqlOutput::Borrowed(rusqlite::types::ValueRef::Text(
                v.as_bytes(),
            )),
            SqlValue::Bytes(v) => ToSqlOutput::Borrowed(rusqlite::types::ValueRef::Blob(v)),
            SqlValue::Uuid(v) => ToSqlOutput::Owned(SqliteValue::Blob(v.as_bytes().to_vec())),
            SqlValue::Decimal(v) => ToSqlOutput::Owned(SqliteValue::Text(v.to_string())),
            SqlValue::DateTime(v) => {
                ToSqlOutput::Owned(SqliteValue::Text(v.format(DATETIME_FORMAT).to_string()))
            }
            SqlValue::Date(v) => {
                ToSqlOutput::Owned(SqliteValue::Text(v.format("%Y-%m-%d").to_string()))
            }
            SqlValue::Time(v) => {
                ToSqlOutput::Owned(SqliteValue::Text(v.format("%H:%M:%S%.f").to_string()))
            }
        };
        Ok(out)
    }
}
