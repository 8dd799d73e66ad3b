// crates/outpost-reader/src/key.rs
// ============================================================================
// Module: Outpost Key Values
// Description: Caller-supplied key values and type-aware coercion.
// Purpose: Marshal lookup keys against the primary-key descriptor before
//          binding them to a prepared statement.
// Dependencies: outpost-core, rusqlite
// ============================================================================

//! ## Overview
//! Lookup keys arrive as an ordered tuple of [`KeyValue`]s. Before binding,
//! each position is matched against the declared field type at that key
//! position. The sole transformation is textual → bytes when the column is
//! byte-like; SQLite compares BLOB and TEXT values by storage class, so a
//! text key would otherwise never match a binary-keyed row. Everything else
//! passes through to the driver unchanged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use outpost_core::PrimaryKey;
use rusqlite::ToSql;
use rusqlite::types::Null;
use rusqlite::types::ToSqlOutput;

use crate::errors::ReaderError;

// ============================================================================
// SECTION: Key Values
// ============================================================================

/// One position of a lookup key.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// Floating-point number.
    Real(f64),
    /// Textual value.
    Text(String),
    /// Byte-string value.
    Bytes(Vec<u8>),
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for KeyValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for KeyValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for KeyValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for KeyValue {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl ToSql for KeyValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Null => Null.to_sql(),
            Self::Integer(value) => value.to_sql(),
            Self::Real(value) => value.to_sql(),
            Self::Text(value) => value.to_sql(),
            Self::Bytes(value) => value.to_sql(),
        }
    }
}

// ============================================================================
// SECTION: Coercion
// ============================================================================

/// Coerces a key tuple column-wise against the primary-key descriptor.
///
/// # Errors
///
/// Returns [`ReaderError::InsufficientKeyTypes`] when a key position has no
/// corresponding descriptor field.
pub(crate) fn coerce_key(pk: &PrimaryKey, key: Vec<KeyValue>) -> Result<Vec<KeyValue>, ReaderError> {
    let mut key = key;
    for (index, value) in key.iter_mut().enumerate() {
        let Some(field) = pk.field(index) else {
            return Err(ReaderError::InsufficientKeyTypes);
        };
        if field.field_type.is_byte_like() {
            if let KeyValue::Text(text) = value {
                *value = KeyValue::Bytes(std::mem::take(text).into_bytes());
            }
        }
    }
    Ok(key)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
