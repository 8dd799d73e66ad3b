// crates/outpost-core/src/schema/mod.rs
// ============================================================================
// Module: Outpost Schema Types
// Description: Validated names, field types, and primary-key descriptors.
// Purpose: Provide the schema vocabulary shared by reflector and reader.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Control tables are addressed by a (family, table) pair. Both parts are
//! validated against a fixed character policy and composed into the physical
//! LDB table name. Column types are described by a closed [`FieldType`]
//! enumeration resolved from raw SQLite declared-type strings, and a table's
//! key structure by an ordered [`PrimaryKey`] descriptor.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Modules
// ============================================================================

mod field_type;
mod names;
mod primary_key;

pub use field_type::FieldType;
pub use names::FamilyName;
pub use names::FieldName;
pub use names::MAX_FAMILY_NAME_LEN;
pub use names::MAX_FIELD_NAME_LEN;
pub use names::MAX_TABLE_NAME_LEN;
pub use names::TableName;
pub use names::ldb_table_name;
pub use primary_key::PkField;
pub use primary_key::PrimaryKey;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Schema vocabulary errors.
///
/// # Invariants
/// - Messages carry the offending input so operators can locate the bad
///   table definition without re-querying the LDB.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A family, table, or field name violated the character policy.
    #[error("invalid {kind} name {name:?}: {reason}")]
    InvalidName {
        /// Which kind of name was rejected ("family", "table", "field").
        kind: &'static str,
        /// The rejected input, after lowercasing.
        name: String,
        /// Why the input was rejected.
        reason: &'static str,
    },
    /// A raw SQLite declared type did not resolve to a known field type.
    #[error("unknown field type {raw:?}")]
    UnknownFieldType {
        /// The unresolvable raw type string.
        raw: String,
    },
    /// Primary-key metadata supplied mismatched name and type counts.
    #[error("field name/type count mismatch: {names} names, {types} types")]
    FieldCountMismatch {
        /// Number of field names supplied.
        names: usize,
        /// Number of raw types supplied.
        types: usize,
    },
}
