// crates/outpost-core/src/schema/field_type.rs
// ============================================================================
// Module: Outpost Field Types
// Description: Closed enumeration of semantic column storage types.
// Purpose: Resolve raw SQLite declared types into the types that drive key
//          marshaling in the reader.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every control-table column carries one of a closed set of semantic storage
//! types. The reader discovers them from the raw declared-type strings SQLite
//! reports and uses them to decide how caller-supplied key values are bound.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::schema::SchemaError;

// ============================================================================
// SECTION: Field Types
// ============================================================================

/// Semantic storage type of a control-table column.
///
/// # Invariants
/// - The set is closed; raw types that resolve to nothing here are a schema
///   error, never a silent fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// 64-bit signed integer.
    Integer,
    /// Floating-point or fixed-decimal number.
    Decimal,
    /// Short bounded string (VARCHAR-declared).
    String,
    /// Unbounded text.
    Text,
    /// Short bounded byte string (VARBINARY-declared).
    ByteString,
    /// Unbounded binary blob.
    Binary,
    /// Wall-clock time point.
    Timestamp,
}

impl FieldType {
    /// Resolves a raw SQLite declared type into a field type.
    ///
    /// The comparison is case-insensitive and ignores a parenthesized length
    /// suffix, so `varchar(191)` resolves the same as `VARCHAR`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownFieldType`] for raw types outside the
    /// closed set.
    pub fn from_sql_type(raw: &str) -> Result<Self, SchemaError> {
        let base = raw.split_once('(').map_or(raw, |(head, _)| head);
        let base = base.trim().to_ascii_uppercase();
        match base.as_str() {
            "INTEGER" | "INT" | "BIGINT" | "SMALLINT" | "TINYINT" => Ok(Self::Integer),
            "REAL" | "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" | "DECIMAL" | "NUMERIC" => {
                Ok(Self::Decimal)
            }
            "VARCHAR" | "CHAR" | "CHARACTER" => Ok(Self::String),
            "TEXT" | "CLOB" => Ok(Self::Text),
            "VARBINARY" => Ok(Self::ByteString),
            "BLOB" | "BINARY" => Ok(Self::Binary),
            "DATETIME" | "TIMESTAMP" => Ok(Self::Timestamp),
            _ => Err(SchemaError::UnknownFieldType {
                raw: raw.to_string(),
            }),
        }
    }

    /// Returns true for the byte-oriented types that trigger key coercion.
    #[must_use]
    pub const fn is_byte_like(self) -> bool {
        matches!(self, Self::ByteString | Self::Binary)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::String => "string",
            Self::Text => "text",
            Self::ByteString => "bytestring",
            Self::Binary => "binary",
            Self::Timestamp => "timestamp",
        };
        f.write_str(label)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::FieldType;
    use crate::schema::SchemaError;

    #[test]
    fn resolves_common_raw_types() {
        assert_eq!(FieldType::from_sql_type("INTEGER"), Ok(FieldType::Integer));
        assert_eq!(FieldType::from_sql_type("text"), Ok(FieldType::Text));
        assert_eq!(FieldType::from_sql_type("BLOB"), Ok(FieldType::Binary));
        assert_eq!(FieldType::from_sql_type("DATETIME"), Ok(FieldType::Timestamp));
    }

    #[test]
    fn resolves_parenthesized_lengths() {
        assert_eq!(FieldType::from_sql_type("VARCHAR(191)"), Ok(FieldType::String));
        assert_eq!(FieldType::from_sql_type("varbinary(32)"), Ok(FieldType::ByteString));
    }

    #[test]
    fn rejects_unknown_raw_types() {
        let Err(err) = FieldType::from_sql_type("GEOMETRY") else {
            panic!("expected unknown raw type to fail");
        };
        assert_eq!(
            err,
            SchemaError::UnknownFieldType {
                raw: "GEOMETRY".to_string()
            }
        );
    }

    #[test]
    fn byte_like_covers_exactly_the_binary_types() {
        assert!(FieldType::ByteString.is_byte_like());
        assert!(FieldType::Binary.is_byte_like());
        assert!(!FieldType::Text.is_byte_like());
        assert!(!FieldType::Integer.is_byte_like());
    }
}
