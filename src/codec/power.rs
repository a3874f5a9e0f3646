//! Flat power report codec
//!
//! A power report is one row in a single group named `PowerReport`. Every
//! field of the record other than the common ones is a column.

use crate::storage::{is_common_field, CsvDbError, CsvDbResult, Record, Row, Value, COMMON_FIELDS};

use super::{decode_common, required_cell, GroupRows, ReportCodec};

/// Group (and file stem) used for power reports
pub const POWER_GROUP: &str = "PowerReport";

/// Codec for flat power reports: `{timestamp, sensor, target, socket, cpu, power, ...}`
#[derive(Debug, Clone, Copy, Default)]
pub struct PowerReportCodec;

impl ReportCodec for PowerReportCodec {
    fn name(&self) -> &'static str {
        "power"
    }

    fn to_csvdb(&self, record: &Record) -> CsvDbResult<GroupRows> {
        required_cell(record, "timestamp")?;

        let mut row = Record::new();
        for (field, value) in record {
            if !value.is_scalar() {
                return Err(CsvDbError::Codec(format!(
                    "power report field '{}' must be a scalar",
                    field
                )));
            }
            row.insert(field.clone(), value.clone());
        }

        let mut groups = GroupRows::new();
        groups.insert(POWER_GROUP.to_string(), vec![row]);
        Ok(groups)
    }

    fn from_csvdb(&self, _file_name: &str, row: &Row) -> CsvDbResult<Record> {
        let mut record = Record::new();
        decode_common(row, &COMMON_FIELDS, &mut record)?;
        for (column, cell) in row {
            if !is_common_field(column) {
                record.insert(column.clone(), Value::from_cell(cell));
            }
        }
        Ok(record)
    }
}
