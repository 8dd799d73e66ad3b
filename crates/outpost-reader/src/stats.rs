// crates/outpost-reader/src/stats.rs
// ============================================================================
// Module: Outpost Reader Stats
// Description: Per-lookup latency observations and scan counters.
// Purpose: Expose the operational metric surface health tooling scrapes.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every lookup records a latency observation tagged with the caller's
//! family and table; zero-length prefix scans additionally increment the
//! full-table-scan counter under the same tags. The metric names are part of
//! the operational contract (dashboards and alerts key on them), so they
//! are exported as constants. Counters are mutex-guarded; observations land
//! in fixed microsecond buckets.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Metric name of point-lookup latency observations.
pub const METRIC_GET_ROW_BY_KEY: &str = "get_row_by_key";
/// Metric name of prefix-scan latency observations.
pub const METRIC_GET_ROWS_BY_KEY_PREFIX: &str = "get_rows_by_key_prefix";
/// Metric name of the full-table-scan counter.
pub const METRIC_FULL_TABLE_SCANS: &str = "full-table-scans";

/// Microsecond bucket boundaries for lookup latency histograms.
const LOOKUP_BUCKETS_US: [u64; 10] =
    [50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 25_000, 50_000];

// ============================================================================
// SECTION: Series
// ============================================================================

/// Identity of one latency series: metric name plus caller tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SeriesKey {
    /// Metric name.
    metric: &'static str,
    /// Family tag as supplied by the caller.
    family: String,
    /// Table tag as supplied by the caller.
    table: String,
}

/// Accumulated observations for one series.
#[derive(Debug, Clone, Default)]
struct LookupSeries {
    /// Number of observations.
    count: u64,
    /// Cumulative latency in microseconds.
    total_us: u64,
    /// `<= bound` bucket counts plus an overflow slot.
    histogram: [u64; LOOKUP_BUCKETS_US.len() + 1],
}

/// Returns the histogram slot for a latency in microseconds.
fn bucket_index(latency_us: u64) -> usize {
    LOOKUP_BUCKETS_US
        .iter()
        .position(|bound| latency_us <= *bound)
        .unwrap_or(LOOKUP_BUCKETS_US.len())
}

// ============================================================================
// SECTION: Stats
// ============================================================================

/// In-process lookup stats owned by one reader.
#[derive(Debug, Default)]
pub struct ReaderStats {
    /// Latency series keyed by metric and caller tags.
    lookups: Mutex<HashMap<SeriesKey, LookupSeries>>,
    /// Full-table-scan counts keyed by caller tags.
    full_table_scans: Mutex<HashMap<(String, String), u64>>,
}

impl ReaderStats {
    /// Records one lookup latency observation.
    pub(crate) fn observe_lookup(
        &self,
        metric: &'static str,
        family: &str,
        table: &str,
        elapsed: Duration,
    ) {
        let latency_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        let key = SeriesKey {
            metric,
            family: family.to_string(),
            table: table.to_string(),
        };
        let mut lookups = self.lookups.lock().unwrap_or_else(PoisonError::into_inner);
        let series = lookups.entry(key).or_default();
        series.count = series.count.saturating_add(1);
        series.total_us = series.total_us.saturating_add(latency_us);
        let slot = bucket_index(latency_us);
        series.histogram[slot] = series.histogram[slot].saturating_add(1);
    }

    /// Increments the full-table-scan counter for the caller tags.
    pub(crate) fn incr_full_table_scan(&self, family: &str, table: &str) {
        let mut scans = self.full_table_scans.lock().unwrap_or_else(PoisonError::into_inner);
        let count = scans.entry((family.to_string(), table.to_string())).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Returns a snapshot of all series, sorted for stable output.
    #[must_use]
    pub fn snapshot(&self) -> ReaderStatsSnapshot {
        let lookups = self.lookups.lock().unwrap_or_else(PoisonError::into_inner);
        let mut series: Vec<LookupSeriesSnapshot> = lookups
            .iter()
            .map(|(key, value)| LookupSeriesSnapshot {
                metric: key.metric.to_string(),
                family: key.family.clone(),
                table: key.table.clone(),
                count: value.count,
                total_us: value.total_us,
                histogram: value.histogram.to_vec(),
            })
            .collect();
        drop(lookups);
        series.sort_by(|a, b| {
            (&a.metric, &a.family, &a.table).cmp(&(&b.metric, &b.family, &b.table))
        });
        let scans = self.full_table_scans.lock().unwrap_or_else(PoisonError::into_inner);
        let mut full_table_scans: Vec<FullTableScanSnapshot> = scans
            .iter()
            .map(|((family, table), count)| FullTableScanSnapshot {
                metric: METRIC_FULL_TABLE_SCANS.to_string(),
                family: family.clone(),
                table: table.clone(),
                count: *count,
            })
            .collect();
        drop(scans);
        full_table_scans.sort_by(|a, b| (&a.family, &a.table).cmp(&(&b.family, &b.table)));
        ReaderStatsSnapshot {
            bucket_bounds_us: LOOKUP_BUCKETS_US.to_vec(),
            lookups: series,
            full_table_scans,
        }
    }

    /// Resets all series to zero.
    pub fn reset(&self) {
        self.lookups.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.full_table_scans.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

// ============================================================================
// SECTION: Snapshots
// ============================================================================

/// Snapshot of one latency series.
#[derive(Debug, Clone, Serialize)]
pub struct LookupSeriesSnapshot {
    /// Metric name.
    pub metric: String,
    /// Family tag.
    pub family: String,
    /// Table tag.
    pub table: String,
    /// Number of observations.
    pub count: u64,
    /// Cumulative latency in microseconds.
    pub total_us: u64,
    /// Histogram counts (length = bucket bounds + 1 overflow slot).
    pub histogram: Vec<u64>,
}

/// Snapshot of one full-table-scan counter.
#[derive(Debug, Clone, Serialize)]
pub struct FullTableScanSnapshot {
    /// Metric name (always [`METRIC_FULL_TABLE_SCANS`]).
    pub metric: String,
    /// Family tag.
    pub family: String,
    /// Table tag.
    pub table: String,
    /// Number of full-table scans observed.
    pub count: u64,
}

/// Snapshot of a reader's whole stats surface.
#[derive(Debug, Clone, Serialize)]
pub struct ReaderStatsSnapshot {
    /// Histogram bucket boundaries in microseconds.
    pub bucket_bounds_us: Vec<u64>,
    /// Latency series, sorted by (metric, family, table).
    pub lookups: Vec<LookupSeriesSnapshot>,
    /// Full-table-scan counters, sorted by (family, table).
    pub full_table_scans: Vec<FullTableScanSnapshot>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
