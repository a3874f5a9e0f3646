//! Report codecs
//!
//! A codec translates between domain reports and the group/row layout the
//! store keeps on disk. The store never interprets report fields itself; it
//! only asks the codec to split a record into groups on write, and to turn
//! one raw row back into a record fragment on read.

mod hwpc;
mod power;

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::storage::{CsvDbError, CsvDbResult, Record, Row, Value};

pub use hwpc::{HwpcReportCodec, GROUPS_FIELD};
pub use power::{PowerReportCodec, POWER_GROUP};

/// Rows to append, keyed by group name (one file per group)
pub type GroupRows = BTreeMap<String, Vec<Record>>;

/// Translation between domain records and stored rows.
///
/// Implementations hold no store state and must be pure transformations.
pub trait ReportCodec {
    /// Short name, used in logs
    fn name(&self) -> &'static str;

    /// Splits a record into named groups of flat rows.
    ///
    /// Every row must carry the common fields and only scalar values.
    fn to_csvdb(&self, record: &Record) -> CsvDbResult<GroupRows>;

    /// Rebuilds a record fragment from one raw row of the file `file_name`.
    ///
    /// Fragments decoded at the same timestamp are deep-merged by the store.
    fn from_csvdb(&self, file_name: &str, row: &Row) -> CsvDbResult<Record>;
}

/// Codec selected in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// [`PowerReportCodec`]
    #[default]
    Power,
    /// [`HwpcReportCodec`]
    Hwpc,
}

/// Group name carried by a file name: `pkg.csv` -> `pkg`
pub fn group_from_file_name(file_name: &str) -> &str {
    file_name.strip_suffix(".csv").unwrap_or(file_name)
}

/// Copies the common identifying fields of a raw row into a fragment.
///
/// `timestamp` becomes an integer, the others stay text so identifiers such
/// as socket `0` keep their textual form.
fn decode_common(row: &Row, fields: &[&str], out: &mut Record) -> CsvDbResult<()> {
    for field in fields {
        let Some(cell) = row.get(*field) else {
            continue;
        };
        let value = if *field == "timestamp" {
            let ts = cell
                .trim()
                .parse::<i64>()
                .map_err(|_| CsvDbError::Codec(format!("timestamp '{}' is not an integer", cell)))?;
            Value::Int(ts)
        } else {
            Value::Text(cell.clone())
        };
        out.insert(field.to_string(), value);
    }
    Ok(())
}

/// Reads a required scalar field of a record as cell text
fn required_cell(record: &Record, field: &str) -> CsvDbResult<String> {
    record
        .get(field)
        .and_then(Value::to_cell)
        .ok_or_else(|| CsvDbError::InvalidRecord(format!("missing scalar field '{}'", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_from_file_name() {
        assert_eq!(group_from_file_name("PowerReport.csv"), "PowerReport");
        assert_eq!(group_from_file_name("pkg"), "pkg");
    }

    #[test]
    fn test_codec_kind_from_config_string() {
        let kind: CodecKind = serde_json::from_str("\"hwpc\"").unwrap();
        assert_eq!(kind, CodecKind::Hwpc);
        assert_eq!(CodecKind::default(), CodecKind::Power);
    }

    #[test]
    fn test_decode_common_keeps_identifiers_textual() {
        let row: Row = [("timestamp", "12"), ("socket", "0"), ("power", "3")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut out = Record::new();
        decode_common(&row, &["timestamp", "socket", "cpu"], &mut out).unwrap();

        assert_eq!(out["timestamp"], Value::Int(12));
        assert_eq!(out["socket"], Value::Text("0".into()));
        assert!(!out.contains_key("cpu"));
        assert!(!out.contains_key("power"));
    }
}
