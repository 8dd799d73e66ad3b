// crates/outpost-reader/src/lib.rs
// ============================================================================
// Module: Outpost LDB Reader
// Description: Concurrent, caching read path over the Outpost local database.
// Purpose: Give every consumer process local, synchronous, microsecond
//          lookups into the replicated control dataset.
// Dependencies: outpost-core, rusqlite, chrono, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! This crate implements the hot read path of Outpost. A reflector (not part
//! of this crate) tails the authoritative ledger and applies it to a local
//! SQLite file, the LDB; the [`LdbReader`] here serves point lookups by full
//! primary key, streaming scans by key prefix, and the freshness and
//! liveness probes health tooling depends on. The reader is safe to share
//! across every thread of a process, absorbs authoring-side schema changes
//! without restarts, and never writes.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod cancel;
mod config;
mod errors;
mod key;
mod pool;
mod reader;
mod rows;
mod scan;
mod stats;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cancel::CancelToken;
pub use config::ReaderConfig;
pub use errors::ReaderError;
pub use key::KeyValue;
pub use reader::LdbReader;
pub use rows::Rows;
pub use scan::DbColumnMeta;
pub use scan::RowData;
pub use scan::RowSink;
pub use scan::ScanPlan;
pub use scan::SqlValue;
pub use stats::FullTableScanSnapshot;
pub use stats::LookupSeriesSnapshot;
pub use stats::METRIC_FULL_TABLE_SCANS;
pub use stats::METRIC_GET_ROWS_BY_KEY_PREFIX;
pub use stats::METRIC_GET_ROW_BY_KEY;
pub use stats::ReaderStats;
pub use stats::ReaderStatsSnapshot;
