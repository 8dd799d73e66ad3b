// crates/outpost-reader/src/pool.rs
// ============================================================================
// Module: Outpost Read Pool
// Description: Fixed pool of mutex-guarded LDB connections.
// Purpose: Give concurrent lookups and streaming scans independent
//          connections without sharing a driver handle across threads.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! The reader owns a fixed set of read-only connections to the LDB file,
//! each behind its own mutex, selected round-robin. SQLite provides the
//! multi-process read concurrency; the pool provides the in-process side.
//! Each connection carries its own prepared-statement cache, so statement
//! handles live and die with their connection. The pool is shared by `Arc`:
//! closing the reader drops its reference, and the connections are finalized
//! exactly once, after the last in-flight holder is done.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;

use crate::config::ReaderConfig;
use crate::errors::ReaderError;

// ============================================================================
// SECTION: Pool
// ============================================================================

/// Fixed pool of mutex-guarded LDB connections.
#[derive(Debug)]
pub(crate) struct ReadPool {
    /// Pooled connections, each serialized by its own mutex.
    connections: Vec<Mutex<Connection>>,
    /// Round-robin cursor for connection selection.
    cursor: AtomicUsize,
}

impl ReadPool {
    /// Opens a pool of `read_pool_size` connections per the configuration.
    pub(crate) fn open(config: &ReaderConfig) -> Result<Self, ReaderError> {
        let mut connections = Vec::with_capacity(config.read_pool_size);
        for _ in 0..config.read_pool_size {
            connections.push(Mutex::new(open_connection(config)?));
        }
        Ok(Self {
            connections,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Builds a pool over caller-opened connections.
    pub(crate) fn from_connections(connections: Vec<Connection>) -> Self {
        Self {
            connections: connections.into_iter().map(Mutex::new).collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Returns the next connection using round-robin selection.
    pub(crate) fn connection(&self) -> &Mutex<Connection> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        &self.connections[index]
    }
}

/// Opens one LDB connection with the configured pragmas and cache capacity.
fn open_connection(config: &ReaderConfig) -> Result<Connection, ReaderError> {
    let flags = if config.read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
    } else {
        OpenFlags::default()
    };
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| ReaderError::query("open ldb", err))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| ReaderError::query("set busy timeout", err))?;
    connection.set_prepared_statement_cache_capacity(config.stmt_cache_capacity);
    Ok(connection)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::ReadPool;

    #[test]
    fn round_robin_cycles_over_all_connections() {
        let connections = vec![
            Connection::open_in_memory().expect("open connection"),
            Connection::open_in_memory().expect("open connection"),
        ];
        let pool = ReadPool::from_connections(connections);
        let first = std::ptr::from_ref(pool.connection());
        let second = std::ptr::from_ref(pool.connection());
        let third = std::ptr::from_ref(pool.connection());
        assert_ne!(first, second);
        assert_eq!(first, third);
    }
}
