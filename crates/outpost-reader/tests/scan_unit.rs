// crates/outpost-reader/tests/scan_unit.rs
// ============================================================================
// Module: Row Decoding Unit Tests
// Description: Targeted tests for sink shapes and scan-plan construction.
// Purpose: Validate mapping vs. record destinations, case-insensitive
//          matching, skipped columns, and setup-time failures.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::HashMap;

use outpost_core::FieldType;
use outpost_reader::DbColumnMeta;
use outpost_reader::ReaderError;
use outpost_reader::RowData;
use outpost_reader::RowSink;
use outpost_reader::ScanPlan;
use outpost_reader::SqlValue;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn columns(names: &[&str]) -> Vec<DbColumnMeta> {
    names
        .iter()
        .map(|name| DbColumnMeta {
            name: (*name).to_string(),
            field_type: Some(FieldType::Text),
        })
        .collect()
}

fn row(values: Vec<SqlValue>) -> RowData {
    RowData { values }
}

/// Record sink declaring lowercase field names.
#[derive(Debug, Default)]
struct Placement {
    campaign: String,
    slot: i64,
}

impl RowSink for Placement {
    fn writable_fields(&self) -> Option<Vec<String>> {
        Some(vec!["campaign".to_string(), "slot".to_string()])
    }

    fn put(&mut self, field: &str, value: SqlValue) -> Result<(), ReaderError> {
        match (field, value) {
            ("campaign", SqlValue::Text(campaign)) => {
                self.campaign = campaign;
                Ok(())
            }
            ("slot", SqlValue::Integer(slot)) => {
                self.slot = slot;
                Ok(())
            }
            (field, value) => Err(ReaderError::Scan(format!(
                "unexpected value for {field}: {value:?}"
            ))),
        }
    }
}

/// Sink whose declared fields collide case-insensitively.
struct Ambiguous;

impl RowSink for Ambiguous {
    fn writable_fields(&self) -> Option<Vec<String>> {
        Some(vec!["id".to_string(), "ID".to_string()])
    }

    fn put(&mut self, _field: &str, _value: SqlValue) -> Result<(), ReaderError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Mapping Sinks
// ============================================================================

#[test]
fn mapping_sink_receives_every_column() {
    let cols = columns(&["id", "name", "extra"]);
    let mut sink: HashMap<String, SqlValue> = HashMap::new();
    let plan = ScanPlan::new(&sink, &cols).expect("plan for mapping sink");
    plan.copy_row(
        &row(vec![
            SqlValue::Integer(1),
            SqlValue::Text("cat".to_string()),
            SqlValue::Null,
        ]),
        &mut sink,
    )
    .expect("copy row");
    assert_eq!(sink.len(), 3);
    assert_eq!(sink.get("extra"), Some(&SqlValue::Null));
}

// ============================================================================
// SECTION: Record Sinks
// ============================================================================

#[test]
fn record_sink_matches_fields_case_insensitively() {
    let cols = columns(&["CAMPAIGN", "Slot"]);
    let mut sink = Placement::default();
    let plan = ScanPlan::new(&sink, &cols).expect("plan for record sink");
    plan.copy_row(
        &row(vec![SqlValue::Text("xmas".to_string()), SqlValue::Integer(2)]),
        &mut sink,
    )
    .expect("copy row");
    assert_eq!(sink.campaign, "xmas");
    assert_eq!(sink.slot, 2);
}

#[test]
fn record_sink_skips_undeclared_columns() {
    let cols = columns(&["campaign", "slot", "impressions"]);
    let mut sink = Placement::default();
    let plan = ScanPlan::new(&sink, &cols).expect("plan for record sink");
    plan.copy_row(
        &row(vec![
            SqlValue::Text("easter".to_string()),
            SqlValue::Integer(1),
            SqlValue::Integer(40),
        ]),
        &mut sink,
    )
    .expect("copy row skipping impressions");
    assert_eq!(sink.campaign, "easter");
}

#[test]
fn duplicate_declared_fields_fail_at_setup() {
    let cols = columns(&["id"]);
    let sink = Ambiguous;
    let Err(err) = ScanPlan::new(&sink, &cols) else {
        panic!("expected ambiguous sink to fail at setup");
    };
    assert!(matches!(err, ReaderError::Scan(_)));
}

#[test]
fn width_mismatch_fails_before_any_write() {
    let cols = columns(&["id", "name"]);
    let mut sink: HashMap<String, SqlValue> = HashMap::new();
    let plan = ScanPlan::new(&sink, &cols).expect("plan for mapping sink");
    let result = plan.copy_row(&row(vec![SqlValue::Integer(1)]), &mut sink);
    assert!(matches!(result, Err(ReaderError::Scan(_))));
    assert!(sink.is_empty());
}
