//! Hardware performance counter report codec
//!
//! In memory a report nests its counters by group, socket and cpu:
//!
//! ```text
//! {timestamp, sensor, target, groups: {pkg: {"0": {"0": {RAPL_ENERGY_PKG: 42}}}}}
//! ```
//!
//! On disk each group is its own file with one row per (socket, cpu) pair.
//! Decoding a row yields the same nesting with a single leaf, so merging the
//! fragments of one timestamp reassembles the full report.

use crate::storage::{is_common_field, CsvDbError, CsvDbResult, Record, Row, Value};

use super::{decode_common, group_from_file_name, GroupRows, ReportCodec};

/// Key holding the nested counters
pub const GROUPS_FIELD: &str = "groups";

/// Codec for hardware counter reports
#[derive(Debug, Clone, Copy, Default)]
pub struct HwpcReportCodec;

fn nested<'a>(value: &'a Value, what: &str) -> CsvDbResult<&'a Record> {
    value
        .as_map()
        .ok_or_else(|| CsvDbError::Codec(format!("{} must be a mapping", what)))
}

impl ReportCodec for HwpcReportCodec {
    fn name(&self) -> &'static str {
        "hwpc"
    }

    fn to_csvdb(&self, record: &Record) -> CsvDbResult<GroupRows> {
        let mut base = Record::new();
        for field in ["timestamp", "sensor", "target"] {
            let value = record
                .get(field)
                .filter(|v| v.is_scalar())
                .cloned()
                .ok_or_else(|| {
                    CsvDbError::InvalidRecord(format!("missing scalar field '{}'", field))
                })?;
            base.insert(field.to_string(), value);
        }

        let groups = record
            .get(GROUPS_FIELD)
            .ok_or_else(|| CsvDbError::InvalidRecord("missing field 'groups'".into()))?;
        let groups = nested(groups, "groups")?;

        let mut out = GroupRows::new();
        for (group, sockets) in groups {
            let rows = out.entry(group.clone()).or_default();
            for (socket, cpus) in nested(sockets, &format!("group '{}'", group))? {
                for (cpu, events) in nested(cpus, &format!("socket '{}'", socket))? {
                    let mut row = base.clone();
                    row.insert("socket".to_string(), Value::Text(socket.clone()));
                    row.insert("cpu".to_string(), Value::Text(cpu.clone()));
                    for (event, value) in nested(events, &format!("cpu '{}'", cpu))? {
                        if !value.is_scalar() || is_common_field(event) {
                            return Err(CsvDbError::Codec(format!(
                                "event '{}' in group '{}' must be a scalar counter",
                                event, group
                            )));
                        }
                        row.insert(event.clone(), value.clone());
                    }
                    rows.push(row);
                }
            }
        }
        Ok(out)
    }

    fn from_csvdb(&self, file_name: &str, row: &Row) -> CsvDbResult<Record> {
        let mut record = Record::new();
        decode_common(row, &["timestamp", "sensor", "target"], &mut record)?;

        let socket = row.get("socket").cloned().unwrap_or_default();
        let cpu = row.get("cpu").cloned().unwrap_or_default();

        let events: Record = row
            .iter()
            .filter(|(column, _)| !is_common_field(column))
            .map(|(column, cell)| (column.clone(), Value::from_cell(cell)))
            .collect();

        let mut cpus = Record::new();
        cpus.insert(cpu, Value::Map(events));
        let mut sockets = Record::new();
        sockets.insert(socket, Value::Map(cpus));
        let mut groups = Record::new();
        groups.insert(group_from_file_name(file_name).to_string(), Value::Map(sockets));

        record.insert(GROUPS_FIELD.to_string(), Value::Map(groups));
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::deep_merge;

    fn map(pairs: Vec<(&str, Value)>) -> Value {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn hwpc_record() -> Record {
        let mut r = Record::new();
        r.insert("timestamp".into(), Value::Int(10));
        r.insert("sensor".into(), "sensor".into());
        r.insert("target".into(), "all".into());
        r.insert(
            GROUPS_FIELD.into(),
            map(vec![
                (
                    "pkg",
                    map(vec![(
                        "0",
                        map(vec![
                            ("0", map(vec![("RAPL_ENERGY_PKG", Value::Int(100))])),
                            ("1", map(vec![("RAPL_ENERGY_PKG", Value::Int(200))])),
                        ]),
                    )]),
                ),
                (
                    "core",
                    map(vec![(
                        "0",
                        map(vec![(
                            "0",
                            map(vec![("CYCLES", Value::Int(5)), ("INSTRUCTIONS", Value::Int(9))]),
                        )]),
                    )]),
                ),
            ]),
        );
        r
    }

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_one_row_per_socket_cpu() {
        let groups = HwpcReportCodec.to_csvdb(&hwpc_record()).unwrap();
        assert_eq!(groups["pkg"].len(), 2);
        assert_eq!(groups["core"].len(), 1);

        let core = &groups["core"][0];
        assert_eq!(core["timestamp"], Value::Int(10));
        assert_eq!(core["socket"], Value::Text("0".into()));
        assert_eq!(core["cpu"], Value::Text("0".into()));
        assert_eq!(core["CYCLES"], Value::Int(5));
    }

    #[test]
    fn test_missing_groups_rejected() {
        let mut record = hwpc_record();
        record.remove(GROUPS_FIELD);
        assert!(HwpcReportCodec.to_csvdb(&record).is_err());
    }

    #[test]
    fn test_flat_groups_rejected() {
        let mut record = hwpc_record();
        record.insert(GROUPS_FIELD.into(), Value::Int(3));
        let err = HwpcReportCodec.to_csvdb(&record).unwrap_err();
        assert_eq!(err.code(), "CSVDB_CODEC_ERROR");
    }

    #[test]
    fn test_fragments_merge_into_report() {
        let header = ["timestamp", "sensor", "target", "socket", "cpu"];
        let pkg0 = row(&[
            (header[0], "10"),
            (header[1], "sensor"),
            (header[2], "all"),
            (header[3], "0"),
            (header[4], "0"),
            ("RAPL_ENERGY_PKG", "100"),
        ]);
        let pkg1 = row(&[
            (header[0], "10"),
            (header[1], "sensor"),
            (header[2], "all"),
            (header[3], "0"),
            (header[4], "1"),
            ("RAPL_ENERGY_PKG", "200"),
        ]);
        let core = row(&[
            (header[0], "10"),
            (header[1], "sensor"),
            (header[2], "all"),
            (header[3], "0"),
            (header[4], "0"),
            ("CYCLES", "5"),
            ("INSTRUCTIONS", "9"),
        ]);

        let mut merged = Record::new();
        deep_merge(&mut merged, HwpcReportCodec.from_csvdb("pkg.csv", &pkg0).unwrap());
        deep_merge(&mut merged, HwpcReportCodec.from_csvdb("pkg.csv", &pkg1).unwrap());
        deep_merge(&mut merged, HwpcReportCodec.from_csvdb("core.csv", &core).unwrap());

        assert_eq!(merged, hwpc_record());
    }
}
