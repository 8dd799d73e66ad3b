// crates/outpost-reader/src/scan.rs
// ============================================================================
// Module: Outpost Row Decoding
// Description: Column metadata discovery and type-directed row copying.
// Purpose: Copy decoded rows into caller-provided sinks without the caller
//          knowing the result shape up front.
// Dependencies: outpost-core, rusqlite
// ============================================================================

//! ## Overview
//! Result shape is discovered from statement metadata at query time, not from
//! a schema catalog. A [`RowSink`] is the capability the caller hands over:
//! either an open mapping that accepts every column, or a record shape that
//! declares its writable fields. A [`ScanPlan`] is built once per query from
//! the sink's declared fields and the result columns (matched
//! case-insensitively); unsupported sink shapes fail at plan construction,
//! never mid-row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use outpost_core::FieldType;
use rusqlite::Row;
use rusqlite::Statement;

use crate::errors::ReaderError;

/// Polymorphic cell value decoded from the LDB.
pub type SqlValue = rusqlite::types::Value;

// ============================================================================
// SECTION: Column Metadata
// ============================================================================

/// Metadata of one result column, discovered from the statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbColumnMeta {
    /// Column name as reported by the driver.
    pub name: String,
    /// Resolved field type; `None` for expression columns with no declared
    /// type or types outside the closed set.
    pub field_type: Option<FieldType>,
}

/// Extracts column metadata from a prepared statement.
pub(crate) fn column_meta_from_stmt(stmt: &Statement<'_>) -> Vec<DbColumnMeta> {
    stmt.columns()
        .iter()
        .map(|column| DbColumnMeta {
            name: column.name().to_string(),
            field_type: column
                .decl_type()
                .and_then(|raw| FieldType::from_sql_type(raw).ok()),
        })
        .collect()
}

// ============================================================================
// SECTION: Row Data
// ============================================================================

/// One decoded row, values in result-column order.
#[derive(Debug, Clone, PartialEq)]
pub struct RowData {
    /// Decoded cell values, one per result column.
    pub values: Vec<SqlValue>,
}

/// Decodes the current driver row into owned values.
pub(crate) fn decode_row(row: &Row<'_>, column_count: usize) -> Result<RowData, ReaderError> {
    let mut values = Vec::with_capacity(column_count);
    for index in 0..column_count {
        let value = row
            .get::<_, SqlValue>(index)
            .map_err(|err| ReaderError::Scan(format!("decode column {index}: {err}")))?;
        values.push(value);
    }
    Ok(RowData { values })
}

// ============================================================================
// SECTION: Row Sink
// ============================================================================

/// Destination for a decoded row.
///
/// Implementations come in two shapes: an open mapping
/// (`writable_fields() == None`) that accepts every result column, or a
/// record that declares the field names it can take. Field matching against
/// result columns is case-insensitive.
pub trait RowSink {
    /// Returns the declared writable field names, or `None` for an open
    /// mapping that accepts any column.
    fn writable_fields(&self) -> Option<Vec<String>>;

    /// Writes one decoded column value under the matched field name.
    ///
    /// # Errors
    ///
    /// Implementations return [`ReaderError::Scan`] when the value cannot be
    /// represented in the destination.
    fn put(&mut self, field: &str, value: SqlValue) -> Result<(), ReaderError>;
}

impl RowSink for HashMap<String, SqlValue> {
    fn writable_fields(&self) -> Option<Vec<String>> {
        None
    }

    fn put(&mut self, field: &str, value: SqlValue) -> Result<(), ReaderError> {
        self.insert(field.to_string(), value);
        Ok(())
    }
}

// ============================================================================
// SECTION: Scan Plan
// ============================================================================

/// Per-query copy plan from result columns to sink fields.
///
/// # Invariants
/// - `targets` has one entry per result column: the sink field to write, or
///   `None` for columns the sink does not declare.
#[derive(Debug)]
pub struct ScanPlan {
    targets: Vec<Option<String>>,
}

impl ScanPlan {
    /// Builds a plan from the sink's declared fields and the result columns.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Scan`] when the sink declares duplicate field
    /// names (ambiguous destinations fail before any row is copied).
    pub fn new(sink: &dyn RowSink, columns: &[DbColumnMeta]) -> Result<Self, ReaderError> {
        let targets = match sink.writable_fields() {
            None => columns.iter().map(|column| Some(column.name.clone())).collect(),
            Some(fields) => {
                for (index, field) in fields.iter().enumerate() {
                    let duplicated = fields[index + 1..]
                        .iter()
                        .any(|other| other.eq_ignore_ascii_case(field));
                    if duplicated {
                        return Err(ReaderError::Scan(format!(
                            "sink declares duplicate field {field:?}"
                        )));
                    }
                }
                columns
                    .iter()
                    .map(|column| {
                        fields
                            .iter()
                            .find(|field| field.eq_ignore_ascii_case(&column.name))
                            .cloned()
                    })
                    .collect()
            }
        };
        Ok(Self { targets })
    }

    /// Copies one decoded row into the sink.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Scan`] when the row width does not match the
    /// plan, and propagates sink write failures.
    pub fn copy_row(&self, row: &RowData, sink: &mut dyn RowSink) -> Result<(), ReaderError> {
        if row.values.len() != self.targets.len() {
            return Err(ReaderError::Scan(format!(
                "row has {} values but the plan covers {} columns",
                row.values.len(),
                self.targets.len()
            )));
        }
        for (target, value) in self.targets.iter().zip(&row.values) {
            if let Some(field) = target {
                sink.put(field, value.clone())?;
            }
        }
        Ok(())
    }
}
