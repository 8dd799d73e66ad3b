// crates/outpost-core/src/schema/names.rs
// ============================================================================
// Module: Outpost Name Validation
// Description: Validated family, table, and field name newtypes.
// Purpose: Enforce the identifier charset policy and compose the
//          deterministic local-table name used in the LDB.
// Dependencies: crate::schema::SchemaError
// ============================================================================

//! ## Overview
//! Family and table names are bounded identifiers drawn from a restricted
//! alphabet. Inputs are lowercased before validation so the composition into
//! the physical LDB table name is case-stable. The composition must agree
//! byte-for-byte with the reflector that creates those tables.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use crate::schema::SchemaError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of a family name in bytes.
pub const MAX_FAMILY_NAME_LEN: usize = 30;
/// Maximum length of a table name in bytes.
pub const MAX_TABLE_NAME_LEN: usize = 50;
/// Maximum length of a field name in bytes.
pub const MAX_FIELD_NAME_LEN: usize = 30;

/// Separator between the family and table parts of an LDB table name.
const LDB_TABLE_SEPARATOR: &str = "___";

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Lowercases and validates an identifier against the charset policy.
fn validate_name(kind: &'static str, raw: &str, max_len: usize) -> Result<String, SchemaError> {
    let name = raw.to_ascii_lowercase();
    let reject = |reason: &'static str| SchemaError::InvalidName {
        kind,
        name: name.clone(),
        reason,
    };
    if name.is_empty() {
        return Err(reject("name is empty"));
    }
    if name.len() > max_len {
        return Err(reject("name exceeds maximum length"));
    }
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return Err(reject("name must start with a letter")),
    }
    for byte in bytes {
        if !(byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'_') {
            return Err(reject("name contains characters outside [a-z0-9_]"));
        }
    }
    Ok(name)
}

// ============================================================================
// SECTION: Name Types
// ============================================================================

/// Validated name of a control-table family (a logical namespace).
///
/// # Invariants
/// - Lowercase, non-empty, at most [`MAX_FAMILY_NAME_LEN`] bytes.
/// - First byte is a letter; remaining bytes are drawn from `[a-z0-9_]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FamilyName(String);

impl FamilyName {
    /// Validates and normalizes a family name.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidName`] when the input violates the
    /// charset policy.
    pub fn new(raw: &str) -> Result<Self, SchemaError> {
        validate_name("family", raw, MAX_FAMILY_NAME_LEN).map(Self)
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FamilyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Validated name of a control table within a family.
///
/// # Invariants
/// - Lowercase, non-empty, at most [`MAX_TABLE_NAME_LEN`] bytes.
/// - First byte is a letter; remaining bytes are drawn from `[a-z0-9_]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    /// Validates and normalizes a table name.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidName`] when the input violates the
    /// charset policy.
    pub fn new(raw: &str) -> Result<Self, SchemaError> {
        validate_name("table", raw, MAX_TABLE_NAME_LEN).map(Self)
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Validated name of a column participating in a primary key.
///
/// # Invariants
/// - Lowercase, non-empty, at most [`MAX_FIELD_NAME_LEN`] bytes.
/// - First byte is a letter; remaining bytes are drawn from `[a-z0-9_]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldName(String);

impl FieldName {
    /// Validates and normalizes a field name.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidName`] when the input violates the
    /// charset policy.
    pub fn new(raw: &str) -> Result<Self, SchemaError> {
        validate_name("field", raw, MAX_FIELD_NAME_LEN).map(Self)
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: LDB Table Composition
// ============================================================================

/// Composes the physical LDB table name for a (family, table) pair.
///
/// The composition is one-to-one: the separator cannot occur inside either
/// validated part, so distinct pairs never collide.
#[must_use]
pub fn ldb_table_name(family: &FamilyName, table: &TableName) -> String {
    let mut name =
        String::with_capacity(family.as_str().len() + LDB_TABLE_SEPARATOR.len() + table.as_str().len());
    name.push_str(family.as_str());
    name.push_str(LDB_TABLE_SEPARATOR);
    name.push_str(table.as_str());
    name
}

// ============================================================================
// SECTION: Tests
// ============================================================================
