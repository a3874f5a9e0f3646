//! Write Path Tests
//!
//! Covers the on-disk layout produced by saving reports:
//! - One directory per (sensor, target), one file per group
//! - The header is written once and never changes
//! - A rejected save leaves files untouched
//! - Only integer timestamps are accepted

use std::fs;

use csvdb::codec::{HwpcReportCodec, PowerReportCodec};
use csvdb::storage::{CsvDb, CsvDbError, Record, Value};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn report(ts: i64, extra: &[(&str, f64)]) -> Record {
    let mut r = Record::new();
    r.insert("timestamp".into(), Value::Int(ts));
    r.insert("sensor".into(), "rapl".into());
    r.insert("target".into(), "all".into());
    r.insert("socket".into(), "0".into());
    r.insert("cpu".into(), "-1".into());
    for (field, value) in extra {
        r.insert(field.to_string(), Value::Float(*value));
    }
    r
}

// =============================================================================
// Layout
// =============================================================================

/// Header is written on creation, rows are appended after it.
#[test]
fn test_header_written_once() {
    let temp = TempDir::new().unwrap();
    let db = CsvDb::new(PowerReportCodec, temp.path());

    db.save(&report(1, &[("power", 1.5)])).unwrap();
    db.save(&report(2, &[("power", 2.5)])).unwrap();

    let content = fs::read_to_string(temp.path().join("rapl-all/PowerReport.csv")).unwrap();
    assert_eq!(
        content,
        "timestamp,sensor,target,socket,cpu,power\n\
         1,rapl,all,0,-1,1.5\n\
         2,rapl,all,0,-1,2.5\n"
    );
}

/// Extra columns follow the common ones in sorted order.
#[test]
fn test_extra_columns_sorted() {
    let temp = TempDir::new().unwrap();
    let db = CsvDb::new(PowerReportCodec, temp.path());

    db.save(&report(1, &[("power", 1.0), ("freq", 2.0)])).unwrap();

    let content = fs::read_to_string(temp.path().join("rapl-all/PowerReport.csv")).unwrap();
    let header = content.lines().next().unwrap();
    assert_eq!(header, "timestamp,sensor,target,socket,cpu,freq,power");
}

// =============================================================================
// Header Stability
// =============================================================================

/// A record whose columns differ from the file header is rejected.
#[test]
fn test_header_mismatch_leaves_file_unchanged() {
    let temp = TempDir::new().unwrap();
    let db = CsvDb::new(PowerReportCodec, temp.path());
    let path = temp.path().join("rapl-all/PowerReport.csv");

    db.save(&report(1, &[("power", 1.0)])).unwrap();
    let before = fs::read(&path).unwrap();

    let err = db
        .save(&report(2, &[("power", 2.0), ("freq", 3.0)]))
        .unwrap_err();
    assert!(matches!(err, CsvDbError::HeaderMismatch { .. }));
    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(db.metrics().snapshot().save_failures, 1);
}

/// save_many keeps the records stored before the first failure.
#[test]
fn test_save_many_stops_at_first_failure() {
    let temp = TempDir::new().unwrap();
    let db = CsvDb::new(PowerReportCodec, temp.path());

    let records = vec![
        report(1, &[("power", 1.0)]),
        report(2, &[("freq", 1.0)]),
        report(3, &[("power", 3.0)]),
    ];
    assert!(db.save_many(&records).is_err());

    let content = fs::read_to_string(temp.path().join("rapl-all/PowerReport.csv")).unwrap();
    assert_eq!(content.lines().count(), 2);
}

// =============================================================================
// Timestamps
// =============================================================================

/// A timestamp that would not read back as integer milliseconds is refused,
/// so earlier rows stay replayable.
#[test]
fn test_non_integer_timestamp_rejected() {
    let temp = TempDir::new().unwrap();
    let mut db = CsvDb::new(PowerReportCodec, temp.path());
    let path = temp.path().join("rapl-all/PowerReport.csv");

    let first = report(1, &[("power", 1.0)]);
    db.save(&first).unwrap();
    let before = fs::read(&path).unwrap();

    for bad in [Value::Float(2.5), Value::Text("soon".into())] {
        let mut record = report(2, &[("power", 1.0)]);
        record.insert("timestamp".into(), bad);
        let err = db.save(&record).unwrap_err();
        assert!(matches!(err, CsvDbError::BadTimestamp { .. }));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    db.add_file("rapl-all/PowerReport.csv");
    db.connect().unwrap();
    let replayed: Vec<Record> = db.iter().collect::<Result<_, _>>().unwrap();
    assert_eq!(replayed, vec![first]);
}

/// A report that maps to no rows is refused and creates nothing.
#[test]
fn test_report_without_groups_rejected() {
    let temp = TempDir::new().unwrap();
    let db = CsvDb::new(HwpcReportCodec, temp.path());

    let mut record = Record::new();
    record.insert("timestamp".into(), Value::Int(1));
    record.insert("sensor".into(), "hwpc".into());
    record.insert("target".into(), "all".into());
    record.insert("groups".into(), Value::Map(Record::new()));

    let err = db.save(&record).unwrap_err();
    assert!(matches!(err, CsvDbError::InvalidRecord(_)));
    assert!(!temp.path().join("hwpc-all").exists());
}

/// A refused save for a new entity leaves no directory behind.
#[test]
fn test_rejected_save_leaves_no_directory() {
    let temp = TempDir::new().unwrap();
    let db = CsvDb::new(PowerReportCodec, temp.path());

    let mut record = report(1, &[("power", 1.0)]);
    record.insert("timestamp".into(), Value::Float(1.5));

    assert!(db.save(&record).is_err());
    assert!(!temp.path().join("rapl-all").exists());
}
