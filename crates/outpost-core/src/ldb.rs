// crates/outpost-core/src/ldb.rs
// ============================================================================
// Module: Outpost LDB Bookkeeping
// Description: Well-known LDB table names, sentinels, and the ledger sequence.
// Purpose: Pin the bookkeeping contract between the reflector and the reader.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Alongside the replicated control tables, the reflector maintains two
//! bookkeeping tables in every LDB: a single-row sequence table recording the
//! highest ledger entry applied, and a last-update table recording the
//! wall-clock timestamp of the most recent apply. The reader's freshness and
//! liveness probes are defined entirely in terms of these names.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Name of the single-row sequence table, columns `(id, seq)`.
pub const LDB_SEQ_TABLE: &str = "_ldb_seq";
/// Fixed `id` of the sequence row.
pub const LDB_SEQ_ROW_ID: i64 = 1;
/// Name of the last-update table, columns `(name, timestamp)`.
pub const LDB_LAST_UPDATE_TABLE: &str = "_ldb_last_update";
/// `name` of the row tracking the last applied ledger update.
pub const LDB_LEDGER_UPDATE_NAME: &str = "ledger";
/// Default filename of the LDB on disk.
pub const DEFAULT_LDB_FILENAME: &str = "ldb.db";

// ============================================================================
// SECTION: Sequence
// ============================================================================

/// Monotonic sequence number of the highest ledger entry applied to an LDB.
///
/// # Invariants
/// - Values only grow as the reflector applies ledger entries; a fresh LDB
///   with no applied entries reads as [`Sequence::ZERO`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Sequence(i64);

impl Sequence {
    /// The sequence of an LDB with no applied ledger entries.
    pub const ZERO: Self = Self(0);

    /// Creates a sequence from a raw value.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw sequence value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
