// crates/outpost-reader/tests/reader_unit.rs
// ============================================================================
// Module: LDB Reader Unit Tests
// Description: End-to-end tests for the LDB reader over seeded fixtures.
// Purpose: Validate lookup semantics, key coercion, cache convergence,
//          freshness probes, close semantics, and concurrency safety.
// ============================================================================

//! ## Overview
//! Integration-level tests for the LDB read path:
//! - Point lookups into mapping and record sinks
//! - Prefix scans, full-table scans, and the scan counter
//! - Key coercion for binary-keyed tables
//! - Primary-key cache invalidation and two-step schema-drift convergence
//! - Freshness probes (sequence, ledger latency, ping)
//! - Close and cancellation semantics
//! - Multi-threaded lookups over a shared reader

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use outpost_core::SchemaError;
use outpost_core::Sequence;
use outpost_reader::CancelToken;
use outpost_reader::KeyValue;
use outpost_reader::LdbReader;
use outpost_reader::ReaderConfig;
use outpost_reader::ReaderError;
use outpost_reader::RowSink;
use outpost_reader::SqlValue;
use rusqlite::Connection;
use rusqlite::params;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Creates the bookkeeping tables and the control-table fixtures.
fn seed_ldb(path: &Path) {
    let conn = Connection::open(path).expect("open seed connection");
    conn.execute_batch(
        "CREATE TABLE _ldb_seq (id INTEGER PRIMARY KEY, seq INTEGER);
         INSERT INTO _ldb_seq (id, seq) VALUES (1, 42);
         CREATE TABLE _ldb_last_update (name VARCHAR PRIMARY KEY, timestamp DATETIME);
         CREATE TABLE animals___species (id INTEGER PRIMARY KEY, name VARCHAR(191));
         INSERT INTO animals___species (id, name) VALUES (1, 'cat'), (2, 'dog');
         CREATE TABLE animals___empty (id INTEGER PRIMARY KEY, name VARCHAR(191));
         CREATE TABLE ads___placements (
             campaign VARCHAR(191),
             slot INTEGER,
             impressions INTEGER,
             PRIMARY KEY (campaign, slot)
         );
         INSERT INTO ads___placements (campaign, slot, impressions) VALUES
             ('xmas', 1, 100),
             ('xmas', 2, 250),
             ('easter', 1, 40);
         CREATE TABLE blobs___items (hash BLOB PRIMARY KEY, label VARCHAR(191));
         INSERT INTO blobs___items (hash, label) VALUES (X'61626364', 'alpha');
         CREATE TABLE logs___events (message TEXT);
         INSERT INTO logs___events (message) VALUES ('hello');",
    )
    .expect("seed ldb fixtures");
}

fn reader_for(path: &Path) -> LdbReader {
    let mut config = ReaderConfig::new(path.to_path_buf());
    config.read_pool_size = 2;
    LdbReader::open(config).expect("open reader")
}

/// Seeded temp LDB plus an open reader over it.
fn seeded_reader(temp: &TempDir) -> LdbReader {
    let path = temp.path().join("ldb.db");
    seed_ldb(&path);
    reader_for(&path)
}

fn map_sink() -> HashMap<String, SqlValue> {
    HashMap::new()
}

/// Record-shaped sink for the `animals.species` fixture.
#[derive(Debug, Default)]
struct SpeciesRow {
    id: i64,
    name: String,
}

impl RowSink for SpeciesRow {
    fn writable_fields(&self) -> Option<Vec<String>> {
        Some(vec!["id".to_string(), "name".to_string()])
    }

    fn put(&mut self, field: &str, value: SqlValue) -> Result<(), ReaderError> {
        match (field, value) {
            ("id", SqlValue::Integer(id)) => {
                self.id = id;
                Ok(())
            }
            ("name", SqlValue::Text(name)) => {
                self.name = name;
                Ok(())
            }
            (field, value) => Err(ReaderError::Scan(format!(
                "unexpected value for {field}: {value:?}"
            ))),
        }
    }
}

/// Drains a cursor into one mapping per row.
fn collect_rows(mut rows: outpost_reader::Rows) -> Vec<HashMap<String, SqlValue>> {
    let mut collected = Vec::new();
    while let Some(item) = rows.next() {
        let row = item.expect("scan row");
        let mut out = map_sink();
        rows.scan_into(&row, &mut out).expect("copy row");
        collected.push(out);
    }
    collected
}

// ============================================================================
// SECTION: Point Lookup
// ============================================================================

#[test]
fn point_lookup_finds_row_into_mapping() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let mut out = map_sink();
    let found = reader
        .get_row_by_key(&cancel, &mut out, "animals", "species", vec![KeyValue::from(2_i64)])
        .expect("point lookup");
    assert!(found);
    assert_eq!(out.get("id"), Some(&SqlValue::Integer(2)));
    assert_eq!(out.get("name"), Some(&SqlValue::Text("dog".to_string())));
}

#[test]
fn point_lookup_misses_without_error() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let mut out = map_sink();
    let found = reader
        .get_row_by_key(&cancel, &mut out, "animals", "species", vec![KeyValue::from(99_i64)])
        .expect("point lookup");
    assert!(!found);
    assert!(out.is_empty());
}

#[test]
fn point_lookup_fills_record_sink() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let mut out = SpeciesRow::default();
    let found = reader
        .get_row_by_key(&cancel, &mut out, "animals", "species", vec![KeyValue::from(1_i64)])
        .expect("point lookup");
    assert!(found);
    assert_eq!(out.id, 1);
    assert_eq!(out.name, "cat");
}

#[test]
fn composite_key_lookup_requires_full_key() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let mut out = map_sink();
    let result =
        reader.get_row_by_key(&cancel, &mut out, "ads", "placements", vec![KeyValue::from("xmas")]);
    assert!(matches!(result, Err(ReaderError::NeedFullKey)));

    let found = reader
        .get_row_by_key(
            &cancel,
            &mut out,
            "ads",
            "placements",
            vec![KeyValue::from("xmas"), KeyValue::from(2_i64)],
        )
        .expect("full composite key lookup");
    assert!(found);
    assert_eq!(out.get("impressions"), Some(&SqlValue::Integer(250)));
}

#[test]
fn binary_key_lookup_coerces_text_to_bytes() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let mut out = map_sink();
    let found = reader
        .get_row_by_key(&cancel, &mut out, "blobs", "items", vec![KeyValue::from("abcd")])
        .expect("binary key lookup");
    assert!(found);
    assert_eq!(out.get("label"), Some(&SqlValue::Text("alpha".to_string())));
    assert_eq!(out.get("hash"), Some(&SqlValue::Blob(b"abcd".to_vec())));
}

#[test]
fn binary_key_coercion_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let mut via_text = map_sink();
    let mut via_bytes = map_sink();
    let found_text = reader
        .get_row_by_key(&cancel, &mut via_text, "blobs", "items", vec![KeyValue::from("abcd")])
        .expect("text key lookup");
    let found_bytes = reader
        .get_row_by_key(
            &cancel,
            &mut via_bytes,
            "blobs",
            "items",
            vec![KeyValue::Bytes(b"abcd".to_vec())],
        )
        .expect("bytes key lookup");
    assert!(found_text && found_bytes);
    assert_eq!(via_text, via_bytes);
}

// ============================================================================
// SECTION: Prefix Scan
// ============================================================================

#[test]
fn full_table_scan_yields_all_rows_and_counts_once() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let rows = reader
        .get_rows_by_key_prefix(&cancel, "animals", "species", Vec::new())
        .expect("full table scan");
    let collected = collect_rows(rows);
    assert_eq!(collected.len(), 2);
    let names: Vec<_> = collected
        .iter()
        .map(|row| row.get("name").cloned().expect("name column"))
        .collect();
    assert!(names.contains(&SqlValue::Text("cat".to_string())));
    assert!(names.contains(&SqlValue::Text("dog".to_string())));

    let snapshot = reader.stats().snapshot();
    assert_eq!(snapshot.full_table_scans.len(), 1);
    assert_eq!(snapshot.full_table_scans[0].family, "animals");
    assert_eq!(snapshot.full_table_scans[0].table, "species");
    assert_eq!(snapshot.full_table_scans[0].count, 1);
}

#[test]
fn prefix_scan_filters_on_leading_columns() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let rows = reader
        .get_rows_by_key_prefix(&cancel, "ads", "placements", vec![KeyValue::from("xmas")])
        .expect("prefix scan");
    let collected = collect_rows(rows);
    assert_eq!(collected.len(), 2);
    for row in &collected {
        assert_eq!(row.get("campaign"), Some(&SqlValue::Text("xmas".to_string())));
    }

    let snapshot = reader.stats().snapshot();
    assert!(snapshot.full_table_scans.is_empty());
}

#[test]
fn prefix_scan_is_monotone_under_extension() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let wide = collect_rows(
        reader
            .get_rows_by_key_prefix(&cancel, "ads", "placements", vec![KeyValue::from("xmas")])
            .expect("wide prefix scan"),
    );
    let narrow = collect_rows(
        reader
            .get_rows_by_key_prefix(
                &cancel,
                "ads",
                "placements",
                vec![KeyValue::from("xmas"), KeyValue::from(1_i64)],
            )
            .expect("narrow prefix scan"),
    );
    assert_eq!(narrow.len(), 1);
    for row in &narrow {
        assert!(wide.contains(row));
    }
}

#[test]
fn full_key_lookup_equals_single_row_prefix() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let mut direct = map_sink();
    let found = reader
        .get_row_by_key(
            &cancel,
            &mut direct,
            "ads",
            "placements",
            vec![KeyValue::from("easter"), KeyValue::from(1_i64)],
        )
        .expect("point lookup");
    assert!(found);

    let via_prefix = collect_rows(
        reader
            .get_rows_by_key_prefix(
                &cancel,
                "ads",
                "placements",
                vec![KeyValue::from("easter"), KeyValue::from(1_i64)],
            )
            .expect("full-key prefix scan"),
    );
    assert_eq!(via_prefix.len(), 1);
    assert_eq!(via_prefix[0], direct);
}

#[test]
fn prefix_scan_rejects_too_many_keys() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let result = reader.get_rows_by_key_prefix(
        &cancel,
        "animals",
        "species",
        vec![KeyValue::from(1_i64), KeyValue::from(2_i64)],
    );
    assert!(matches!(result, Err(ReaderError::TooManyKeys)));
}

#[test]
fn empty_table_yields_empty_but_well_formed_results() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let mut out = map_sink();
    let found = reader
        .get_row_by_key(&cancel, &mut out, "animals", "empty", vec![KeyValue::from(1_i64)])
        .expect("point lookup on empty table");
    assert!(!found);

    let rows = reader
        .get_rows_by_key_prefix(&cancel, "animals", "empty", Vec::new())
        .expect("scan of empty table");
    assert!(!rows.columns().is_empty());
    assert_eq!(collect_rows(rows).len(), 0);
}

// ============================================================================
// SECTION: Schema Boundaries
// ============================================================================

#[test]
fn table_without_primary_key_is_rejected() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let mut out = map_sink();
    let result =
        reader.get_row_by_key(&cancel, &mut out, "logs", "events", vec![KeyValue::from(1_i64)]);
    assert!(matches!(result, Err(ReaderError::TableHasNoPrimaryKey)));

    let result = reader.get_rows_by_key_prefix(&cancel, "logs", "events", Vec::new());
    assert!(matches!(result, Err(ReaderError::TableHasNoPrimaryKey)));
}

#[test]
fn missing_table_is_distinguished_from_missing_key() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let mut out = map_sink();
    let result =
        reader.get_row_by_key(&cancel, &mut out, "animals", "nothere", vec![KeyValue::from(1_i64)]);
    assert!(matches!(result, Err(ReaderError::TableNotFound)));
}

#[test]
fn malformed_names_fail_validation() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let mut out = map_sink();
    let result =
        reader.get_row_by_key(&cancel, &mut out, "bad-family", "species", vec![KeyValue::from(1_i64)]);
    assert!(matches!(
        result,
        Err(ReaderError::Schema(SchemaError::InvalidName { kind: "family", .. }))
    ));

    let result = reader.get_rows_by_key_prefix(&cancel, "animals", "spec ies", Vec::new());
    assert!(matches!(
        result,
        Err(ReaderError::Schema(SchemaError::InvalidName { kind: "table", .. }))
    ));
}

#[test]
fn schema_drift_converges_in_two_lookups() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("ldb.db");
    seed_ldb(&path);
    let writer = Connection::open(&path).expect("open writer connection");
    writer
        .execute_batch(
            "CREATE TABLE drift___config (code VARCHAR(191) PRIMARY KEY, payload INTEGER);
             INSERT INTO drift___config (code, payload) VALUES ('a', 10);",
        )
        .expect("create drifting table");

    let reader = reader_for(&path);
    let cancel = CancelToken::new();

    // Warm the primary-key and statement caches against the old schema.
    let mut out = map_sink();
    let found = reader
        .get_row_by_key(&cancel, &mut out, "drift", "config", vec![KeyValue::from("a")])
        .expect("lookup against original schema");
    assert!(found);

    // The authoring side drops and recreates the table with a new key.
    writer
        .execute_batch(
            "DROP TABLE drift___config;
             CREATE TABLE drift___config (id INTEGER PRIMARY KEY, payload INTEGER);
             INSERT INTO drift___config (id, payload) VALUES (7, 20);",
        )
        .expect("recreate drifting table");

    // First lookup still runs against stale metadata and must surface a
    // wrapped store error while invalidating the cached key.
    let mut out = map_sink();
    let result = reader.get_row_by_key(&cancel, &mut out, "drift", "config", vec![KeyValue::from(7_i64)]);
    assert!(matches!(result, Err(ReaderError::Query { .. })));

    // The identical lookup now rediscovers the key and succeeds.
    let mut out = map_sink();
    let found = reader
        .get_row_by_key(&cancel, &mut out, "drift", "config", vec![KeyValue::from(7_i64)])
        .expect("lookup after rediscovery");
    assert!(found);
    assert_eq!(out.get("payload"), Some(&SqlValue::Integer(20)));
}

// ============================================================================
// SECTION: Freshness and Liveness
// ============================================================================

#[test]
fn last_sequence_reads_the_applied_ledger_position() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let seq = reader.get_last_sequence(&cancel).expect("fetch sequence");
    assert_eq!(seq, Sequence::new(42));
}

#[test]
fn last_sequence_is_zero_before_any_apply() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("ldb.db");
    let conn = Connection::open(&path).expect("open seed connection");
    conn.execute_batch("CREATE TABLE _ldb_seq (id INTEGER PRIMARY KEY, seq INTEGER);")
        .expect("create empty seq table");
    drop(conn);

    let reader = reader_for(&path);
    let seq = reader.get_last_sequence(&CancelToken::new()).expect("fetch sequence");
    assert_eq!(seq, Sequence::ZERO);
}

#[test]
fn ledger_latency_requires_an_applied_update() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("ldb.db");
    seed_ldb(&path);
    let reader = reader_for(&path);
    let cancel = CancelToken::new();

    let result = reader.get_ledger_latency(&cancel);
    assert!(matches!(result, Err(ReaderError::NoLedgerUpdates)));

    let writer = Connection::open(&path).expect("open writer connection");
    writer
        .execute(
            "INSERT INTO _ldb_last_update (name, timestamp) VALUES ('ledger', ?1)",
            params![Utc::now()],
        )
        .expect("record ledger update");

    let latency = reader.get_ledger_latency(&cancel).expect("fetch latency");
    assert!(latency < std::time::Duration::from_secs(3600));
}

#[test]
fn ping_reports_ldb_availability() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    assert!(reader.ping(&CancelToken::new()));

    let bare = TempDir::new().unwrap();
    let bare_path = bare.path().join("ldb.db");
    Connection::open(&bare_path).expect("create bare db");
    let bare_reader = reader_for(&bare_path);
    assert!(!bare_reader.ping(&CancelToken::new()));
}

// ============================================================================
// SECTION: Close and Cancellation
// ============================================================================

#[test]
fn close_is_idempotent_and_fails_later_operations() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    reader.close().expect("first close");
    reader.close().expect("second close");

    let mut out = map_sink();
    let result =
        reader.get_row_by_key(&cancel, &mut out, "animals", "species", vec![KeyValue::from(1_i64)]);
    assert!(matches!(result, Err(ReaderError::Closed)));
    assert!(matches!(reader.get_last_sequence(&cancel), Err(ReaderError::Closed)));
    assert!(!reader.ping(&cancel));
}

#[test]
fn in_flight_cursor_survives_close() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let rows = reader
        .get_rows_by_key_prefix(&cancel, "ads", "placements", vec![KeyValue::from("xmas")])
        .expect("prefix scan");
    reader.close().expect("close with cursor outstanding");
    let collected = collect_rows(rows);
    assert_eq!(collected.len(), 2);
}

#[test]
fn cancelled_token_stops_every_operation() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();
    cancel.cancel();

    let mut out = map_sink();
    assert!(matches!(
        reader.get_row_by_key(&cancel, &mut out, "animals", "species", vec![KeyValue::from(1_i64)]),
        Err(ReaderError::Cancelled)
    ));
    assert!(matches!(
        reader.get_rows_by_key_prefix(&cancel, "animals", "species", Vec::new()),
        Err(ReaderError::Cancelled)
    ));
    assert!(matches!(reader.get_last_sequence(&cancel), Err(ReaderError::Cancelled)));
    assert!(matches!(reader.get_ledger_latency(&cancel), Err(ReaderError::Cancelled)));
    assert!(!reader.ping(&cancel));
}

#[test]
fn closing_a_cursor_midway_releases_it() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let mut rows = reader
        .get_rows_by_key_prefix(&cancel, "ads", "placements", Vec::new())
        .expect("full table scan");
    let first = rows.next().expect("first row").expect("row decodes");
    assert!(!first.values.is_empty());
    rows.close();

    // The pool must still serve lookups after the early close.
    let mut out = map_sink();
    let found = reader
        .get_row_by_key(&cancel, &mut out, "animals", "species", vec![KeyValue::from(1_i64)])
        .expect("lookup after cursor close");
    assert!(found);
}

// ============================================================================
// SECTION: Stats
// ============================================================================

#[test]
fn lookups_record_tagged_latency_series() {
    let temp = TempDir::new().unwrap();
    let reader = seeded_reader(&temp);
    let cancel = CancelToken::new();

    let mut out = map_sink();
    let _ = reader
        .get_row_by_key(&cancel, &mut out, "animals", "species", vec![KeyValue::from(1_i64)])
        .expect("point lookup");
    collect_rows(
        reader
            .get_rows_by_key_prefix(&cancel, "ads", "placements", vec![KeyValue::from("xmas")])
            .expect("prefix scan"),
    );

    let snapshot = reader.stats().snapshot();
    let point = snapshot
        .lookups
        .iter()
        .find(|series| series.metric == outpost_reader::METRIC_GET_ROW_BY_KEY)
        .expect("point lookup series");
    assert_eq!(point.family, "animals");
    assert_eq!(point.table, "species");
    assert_eq!(point.count, 1);
    let prefix = snapshot
        .lookups
        .iter()
        .find(|series| series.metric == outpost_reader::METRIC_GET_ROWS_BY_KEY_PREFIX)
        .expect("prefix scan series");
    assert_eq!(prefix.table, "placements");
}

// ============================================================================
// SECTION: Concurrency
// ============================================================================

#[test]
fn concurrent_lookups_share_one_reader() {
    let temp = TempDir::new().unwrap();
    let reader = Arc::new(seeded_reader(&temp));

    let mut handles = Vec::new();
    for worker in 0..8 {
        let reader = Arc::clone(&reader);
        handles.push(thread::spawn(move || {
            let cancel = CancelToken::new();
            for round in 0..50 {
                let id = i64::from((worker + round) % 2) + 1;
                let mut out: HashMap<String, SqlValue> = HashMap::new();
                let found = reader
                    .get_row_by_key(
                        &cancel,
                        &mut out,
                        "animals",
                        "species",
                        vec![KeyValue::from(id)],
                    )
                    .expect("concurrent point lookup");
                assert!(found);
                if round % 10 == 0 {
                    let rows = reader
                        .get_rows_by_key_prefix(
                            &cancel,
                            "ads",
                            "placements",
                            vec![KeyValue::from("xmas")],
                        )
                        .expect("concurrent prefix scan");
                    let mut count = 0;
                    for item in rows {
                        item.expect("concurrent scan row");
                        count += 1;
                    }
                    assert_eq!(count, 2);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().expect("worker thread");
    }

    let snapshot = reader.stats().snapshot();
    let point = snapshot
        .lookups
        .iter()
        .find(|series| series.metric == outpost_reader::METRIC_GET_ROW_BY_KEY)
        .expect("point lookup series");
    assert_eq!(point.count, 8 * 50);
}
