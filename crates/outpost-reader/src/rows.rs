// crates/outpost-reader/src/rows.rs
// ============================================================================
// Module: Outpost Streaming Cursor
// Description: Single-pass row cursor backed by a scan worker thread.
// Purpose: Stream prefix-scan results to the caller without tying driver
//          statement lifetimes to the public API.
// Dependencies: rusqlite, std mpsc
// ============================================================================

//! ## Overview
//! A prefix scan hands back a [`Rows`] cursor: single-pass, finite,
//! non-restartable. Underneath, a worker thread claims a pooled connection,
//! executes the scan, and pushes decoded rows through a bounded channel;
//! the bound is what keeps the cursor lazy, since the worker blocks once the
//! caller stops draining. A synchronous handshake carries the column
//! metadata (or the preparation error) back before the originating call
//! returns. Dropping or closing the cursor cancels the worker, which
//! releases its connection; the cursor therefore must be closed (or dropped)
//! by the caller to free the underlying resources.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::SyncSender;
use std::thread;

use rusqlite::params_from_iter;

use crate::cancel::CancelToken;
use crate::errors::ReaderError;
use crate::key::KeyValue;
use crate::pool::ReadPool;
use crate::scan::DbColumnMeta;
use crate::scan::RowData;
use crate::scan::RowSink;
use crate::scan::ScanPlan;
use crate::scan::column_meta_from_stmt;
use crate::scan::decode_row;

// ============================================================================
// SECTION: Scan Task
// ============================================================================

/// Everything a scan worker needs to run one prefix scan.
pub(crate) struct ScanTask {
    /// Shared connection pool; the worker's clone keeps connections alive
    /// past reader close until the scan finishes.
    pub pool: Arc<ReadPool>,
    /// Generated scan SQL.
    pub sql: Arc<str>,
    /// Coerced key prefix to bind.
    pub key: Vec<KeyValue>,
    /// Bounded channel depth between worker and cursor.
    pub queue_capacity: usize,
    /// Caller-supplied cancellation token.
    pub cancel: CancelToken,
}

/// Spawns the scan worker and performs the column-metadata handshake.
pub(crate) fn spawn_scan(task: ScanTask) -> Result<Rows, ReaderError> {
    let scan_cancel = CancelToken::new();
    let worker_cancel = scan_cancel.clone();
    let (ready_tx, ready_rx) = mpsc::sync_channel(1);
    let (row_tx, row_rx) = mpsc::sync_channel(task.queue_capacity);
    thread::Builder::new()
        .name("outpost-ldb-scan".to_string())
        .spawn(move || run_scan(&task, &worker_cancel, &ready_tx, &row_tx))
        .map_err(|err| ReaderError::Cursor(format!("spawn scan worker: {err}")))?;
    match ready_rx.recv() {
        Ok(Ok(columns)) => Ok(Rows {
            columns,
            receiver: Some(row_rx),
            scan_cancel,
        }),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(ReaderError::Cursor("scan worker exited before handshake".to_string())),
    }
}

/// Worker body: claim a connection, execute, stream decoded rows.
fn run_scan(
    task: &ScanTask,
    scan_cancel: &CancelToken,
    ready_tx: &SyncSender<Result<Vec<DbColumnMeta>, ReaderError>>,
    row_tx: &SyncSender<Result<RowData, ReaderError>>,
) {
    let connection = task.pool.connection();
    let Ok(guard) = connection.lock() else {
        let _ = ready_tx.send(Err(ReaderError::ConnPoisoned));
        return;
    };
    let mut stmt = match guard.prepare_cached(&task.sql) {
        Ok(stmt) => stmt,
        Err(err) => {
            let _ = ready_tx.send(Err(ReaderError::query("prepare prefix scan", err)));
            return;
        }
    };
    let columns = column_meta_from_stmt(&stmt);
    let column_count = columns.len();
    let mut rows = match stmt.query(params_from_iter(task.key.iter())) {
        Ok(rows) => rows,
        Err(err) => {
            let _ = ready_tx.send(Err(ReaderError::query("execute prefix scan", err)));
            return;
        }
    };
    if ready_tx.send(Ok(columns)).is_err() {
        return;
    }
    loop {
        if scan_cancel.is_cancelled() || task.cancel.is_cancelled() {
            break;
        }
        match rows.next() {
            Ok(Some(row)) => {
                let item = decode_row(row, column_count);
                let terminal = item.is_err();
                if row_tx.send(item).is_err() || terminal {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                let _ = row_tx.send(Err(ReaderError::query("iterate prefix scan", err)));
                break;
            }
        }
    }
}

// ============================================================================
// SECTION: Cursor
// ============================================================================

/// Single-pass cursor over the rows matching a key prefix.
///
/// # Invariants
/// - Finite and non-restartable; iteration order is scan order.
/// - The caller owns the cursor and must close (or drop) it to release the
///   scan worker's connection.
#[derive(Debug)]
pub struct Rows {
    /// Result column metadata from the scan statement.
    columns: Vec<DbColumnMeta>,
    /// Live row stream; `None` once exhausted, closed, or empty-constructed.
    receiver: Option<Receiver<Result<RowData, ReaderError>>>,
    /// Cancels the scan worker when the cursor goes away.
    scan_cancel: CancelToken,
}

impl Rows {
    /// Returns an empty, well-formed cursor with no columns and no rows.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            receiver: None,
            scan_cancel: CancelToken::new(),
        }
    }

    /// Returns the result column metadata.
    #[must_use]
    pub fn columns(&self) -> &[DbColumnMeta] {
        &self.columns
    }

    /// Copies one yielded row into the caller's sink.
    ///
    /// # Errors
    ///
    /// Propagates plan-construction and sink write failures.
    pub fn scan_into(&self, row: &RowData, sink: &mut dyn RowSink) -> Result<(), ReaderError> {
        ScanPlan::new(sink, &self.columns)?.copy_row(row, sink)
    }

    /// Closes the cursor, stopping the scan worker.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.scan_cancel.cancel();
        self.receiver = None;
    }
}

impl Iterator for Rows {
    type Item = Result<RowData, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        let received = match self.receiver.as_ref() {
            None => return None,
            Some(receiver) => receiver.recv(),
        };
        match received {
            Ok(item) => Some(item),
            Err(_) => {
                self.receiver = None;
                None
            }
        }
    }
}

impl Drop for Rows {
    fn drop(&mut self) {
        self.shutdown();
    }
}
