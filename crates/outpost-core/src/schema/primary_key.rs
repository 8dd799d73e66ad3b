// crates/outpost-core/src/schema/primary_key.rs
// ============================================================================
// Module: Outpost Primary-Key Descriptor
// Description: Ordered (name, type) descriptor for a control table's key.
// Purpose: Carry the key structure the reader discovers from LDB metadata.
// Dependencies: crate::schema
// ============================================================================

//! ## Overview
//! A primary-key descriptor is the ordered list of (field name, field type)
//! pairs that identify rows of a control table. The empty descriptor is the
//! distinguished "no primary key" value. For a given LDB table the
//! descriptor is immutable; schema changes drop and recreate the table, so a
//! new descriptor becomes observable only after the reader's cache entry for
//! that table is invalidated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::schema::FieldName;
use crate::schema::FieldType;
use crate::schema::SchemaError;

// ============================================================================
// SECTION: Descriptor Types
// ============================================================================

/// One column of a primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkField {
    /// Column name, validated against the field charset policy.
    pub name: FieldName,
    /// Semantic storage type of the column.
    pub field_type: FieldType,
}

/// Ordered primary-key descriptor of a control table.
///
/// # Invariants
/// - Field order is key order as reported by the store's metadata facility.
/// - The empty descriptor means "table declares no primary key".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrimaryKey {
    fields: Vec<PkField>,
}

impl PrimaryKey {
    /// Returns the distinguished empty descriptor.
    #[must_use]
    pub const fn zero() -> Self {
        Self { fields: Vec::new() }
    }

    /// Builds a descriptor from already-validated fields.
    #[must_use]
    pub fn new(fields: Vec<PkField>) -> Self {
        Self { fields }
    }

    /// Builds a descriptor from raw metadata names and declared types.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::FieldCountMismatch`] when the slices differ in
    /// length, and propagates name-validation and type-resolution failures.
    pub fn from_raw_names_and_types(
        names: &[String],
        types: &[String],
    ) -> Result<Self, SchemaError> {
        if names.len() != types.len() {
            return Err(SchemaError::FieldCountMismatch {
                names: names.len(),
                types: types.len(),
            });
        }
        let mut fields = Vec::with_capacity(names.len());
        for (name, raw_type) in names.iter().zip(types) {
            fields.push(PkField {
                name: FieldName::new(name)?,
                field_type: FieldType::from_sql_type(raw_type)?,
            });
        }
        Ok(Self { fields })
    }

    /// Returns true for the distinguished "no primary key" descriptor.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the key arity.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when the descriptor has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the fields in key order.
    #[must_use]
    pub fn fields(&self) -> &[PkField] {
        &self.fields
    }

    /// Returns the field at a key position, if any.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&PkField> {
        self.fields.get(index)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
