// crates/outpost-reader/src/errors.rs
// ============================================================================
// Module: Outpost Reader Errors
// Description: Stable error identities for the LDB read path.
// Purpose: Let callers branch on schema, validation, and freshness failures
//          without string matching.
// Dependencies: outpost-core, rusqlite, thiserror
// ============================================================================

//! ## Overview
//! Reader errors fall into a small taxonomy: validation failures (bad names,
//! wrong key arity), schema failures (missing table, missing primary key),
//! wrapped store failures, cancellation, and the distinguished "no ledger
//! updates" freshness condition. Every variant is a stable identity; wrapped
//! store errors keep the underlying driver error as their source.

// ============================================================================
// SECTION: Imports
// ============================================================================

use outpost_core::SchemaError;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors surfaced by the LDB reader.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The target table declares no primary key.
    #[error("table has no primary key")]
    TableHasNoPrimaryKey,
    /// A point lookup supplied fewer or more values than the key arity.
    #[error("all primary key fields are required")]
    NeedFullKey,
    /// A prefix scan supplied more values than the key arity.
    #[error("too many keys supplied for table's primary key")]
    TooManyKeys,
    /// The reflector has not applied any ledger updates to this LDB yet.
    #[error("no ledger updates have been received yet")]
    NoLedgerUpdates,
    /// The target table does not exist in the LDB.
    #[error("table not found")]
    TableNotFound,
    /// A key position had no corresponding primary-key type information.
    #[error("insufficient key field type data")]
    InsufficientKeyTypes,
    /// The reader has been closed.
    #[error("reader is closed")]
    Closed,
    /// The operation observed its cancellation token.
    #[error("operation cancelled")]
    Cancelled,
    /// Name validation or metadata resolution failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// The reader configuration failed validation.
    #[error("invalid reader configuration: {0}")]
    InvalidConfig(String),
    /// A pooled connection mutex was poisoned by a panicking holder.
    #[error("ldb connection mutex poisoned")]
    ConnPoisoned,
    /// A store-level query failed.
    #[error("{context}: {source}")]
    Query {
        /// What the reader was doing when the store failed.
        context: &'static str,
        /// The underlying driver error.
        #[source]
        source: rusqlite::Error,
    },
    /// A decoded row could not be copied into the caller's sink.
    #[error("row scan error: {0}")]
    Scan(String),
    /// The streaming cursor infrastructure failed.
    #[error("scan cursor error: {0}")]
    Cursor(String),
}

impl ReaderError {
    /// Wraps a driver error with a static context label.
    pub(crate) fn query(context: &'static str, source: rusqlite::Error) -> Self {
        Self::Query { context, source }
    }
}
