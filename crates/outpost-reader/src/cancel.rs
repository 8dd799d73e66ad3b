// crates/outpost-reader/src/cancel.rs
// ============================================================================
// Module: Outpost Cancellation Token
// Description: Cheap cooperative cancellation handle for reader operations.
// Purpose: Let callers abandon lookups and streaming scans without tearing
//          down the reader.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Every reader operation takes a [`CancelToken`] and checks it before each
//! I/O step. Cancellation observed during cache population leaves the caches
//! unchanged; cancellation observed during streaming iteration stops the scan
//! worker, which closes the underlying cursor.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use crate::errors::ReaderError;

// ============================================================================
// SECTION: Token
// ============================================================================

/// Cooperative cancellation handle shared between a caller and the reader.
///
/// Cloning is cheap; all clones observe the same flag. Cancellation is
/// one-way and sticky.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the token cancelled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true once [`CancelToken::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns `Err(ReaderError::Cancelled)` once cancelled.
    pub(crate) fn bail(&self) -> Result<(), ReaderError> {
        if self.is_cancelled() {
            return Err(ReaderError::Cancelled);
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
