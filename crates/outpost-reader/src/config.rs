// crates/outpost-reader/src/config.rs
// ============================================================================
// Module: Outpost Reader Configuration
// Description: Connection and cache tuning for the LDB reader.
// Purpose: Validate operator-supplied settings before any connection opens.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Reader configuration covers the LDB path and a small set of tuning knobs:
//! pool width, busy timeout, per-connection prepared-statement cache
//! capacity, and the bounded queue depth of streaming scans. All knobs have
//! production defaults and are validated up front.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use serde::Deserialize;

use crate::errors::ReaderError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default streaming-scan queue depth.
pub(crate) const DEFAULT_SCAN_QUEUE_CAPACITY: usize = 256;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for [`LdbReader::open`](crate::reader::LdbReader::open).
///
/// # Invariants
/// - `path` must resolve to the LDB file the reflector maintains.
/// - `read_pool_size`, `stmt_cache_capacity`, and `scan_queue_capacity` must
///   be greater than zero.
#[derive(Debug, Clone, Deserialize)]
pub struct ReaderConfig {
    /// Path to the LDB file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds applied to every pooled connection.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Number of pooled read connections.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
    /// Prepared-statement cache capacity per pooled connection.
    #[serde(default = "default_stmt_cache_capacity")]
    pub stmt_cache_capacity: usize,
    /// Bounded queue depth between a streaming scan worker and its cursor.
    #[serde(default = "default_scan_queue_capacity")]
    pub scan_queue_capacity: usize,
    /// Open connections read-only. The reader never writes; disable only for
    /// fixtures that seed and read through the same handle.
    #[serde(default = "default_read_only")]
    pub read_only: bool,
}

impl ReaderConfig {
    /// Builds a configuration with production defaults for the given path.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            busy_timeout_ms: default_busy_timeout_ms(),
            read_pool_size: default_read_pool_size(),
            stmt_cache_capacity: default_stmt_cache_capacity(),
            scan_queue_capacity: default_scan_queue_capacity(),
            read_only: default_read_only(),
        }
    }

    /// Validates the tuning knobs.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::InvalidConfig`] naming the offending knob.
    pub fn validate(&self) -> Result<(), ReaderError> {
        if self.path.as_os_str().is_empty() {
            return Err(ReaderError::InvalidConfig("path must not be empty".to_string()));
        }
        if self.read_pool_size == 0 {
            return Err(ReaderError::InvalidConfig(
                "read_pool_size must be greater than zero".to_string(),
            ));
        }
        if self.stmt_cache_capacity == 0 {
            return Err(ReaderError::InvalidConfig(
                "stmt_cache_capacity must be greater than zero".to_string(),
            ));
        }
        if self.scan_queue_capacity == 0 {
            return Err(ReaderError::InvalidConfig(
                "scan_queue_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Returns the default busy timeout for pooled connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default read pool width.
const fn default_read_pool_size() -> usize {
    4
}

/// Returns the default per-connection statement cache capacity.
const fn default_stmt_cache_capacity() -> usize {
    64
}

/// Returns the default streaming-scan queue depth.
const fn default_scan_queue_capacity() -> usize {
    DEFAULT_SCAN_QUEUE_CAPACITY
}

/// Returns the default read-only flag.
const fn default_read_only() -> bool {
    true
}

// ============================================================================
// SECTION: Tests
// ============================================================================
