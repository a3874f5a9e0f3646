//! Group file writer with header reconciliation
//!
//! Layout: `<base>/<sensor>-<target>/<group>.csv`. Each group file starts
//! with its header line; every appended row must match that header exactly.
//! A mismatch fails the write and is never migrated.
//!
//! A save is validated in full before anything is appended, so a failed
//! save leaves every group file as it was.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::cursor::parse_timestamp;
use super::errors::{CsvDbError, CsvDbResult};
use super::header::{check_header, compute_header};
use super::value::{Record, Value};
use crate::codec::ReportCodec;
use crate::observability::{log_event_with_fields, Event, StoreMetrics};

/// A row ready to append, produced by the validation pass
struct PendingRow {
    path: PathBuf,
    header: Vec<String>,
    cells: Vec<String>,
    write_header: bool,
}

/// Appends records to per-entity group files
pub struct GroupWriter {
    base_path: PathBuf,
    sync_writes: bool,
    metrics: Arc<StoreMetrics>,
}

impl GroupWriter {
    /// Creates a writer rooted at `base_path`.
    pub fn new(base_path: PathBuf, sync_writes: bool, metrics: Arc<StoreMetrics>) -> Self {
        Self {
            base_path,
            sync_writes,
            metrics,
        }
    }

    /// Directory holding the group files of the record's entity.
    ///
    /// # Errors
    ///
    /// `InvalidRecord` if `sensor` or `target` is missing or cannot be used
    /// as a single path component.
    pub fn entity_dir(&self, record: &Record) -> CsvDbResult<PathBuf> {
        let sensor = path_component(record, "sensor")?;
        let target = path_component(record, "target")?;
        Ok(self.base_path.join(format!("{}-{}", sensor, target)))
    }

    /// Writes one record through `codec`.
    ///
    /// # Errors
    ///
    /// - `InvalidRecord` / `Codec` if the record cannot be laid out or
    ///   yields no row
    /// - `BadTimestamp` if a row's timestamp is not integer milliseconds
    /// - `HeaderMismatch` if an existing file has a different header
    /// - `Io` on filesystem failure
    pub fn write<C: ReportCodec + ?Sized>(&self, codec: &C, record: &Record) -> CsvDbResult<()> {
        let groups = codec.to_csvdb(record)?;
        let entity_dir = self.entity_dir(record)?;

        let mut pending = Vec::new();
        // Header each file will carry once this save lands
        let mut planned: HashMap<PathBuf, Vec<String>> = HashMap::new();

        for (group, rows) in &groups {
            if !is_plain_component(group) {
                return Err(CsvDbError::InvalidRecord(format!(
                    "group name '{}' is not a valid file name",
                    group
                )));
            }
            let path = entity_dir.join(format!("{}.csv", group));

            for fields in rows {
                check_timestamp(&path, fields)?;
                let header = compute_header(fields.keys().map(String::as_str));

                let write_header = match planned.get(&path) {
                    Some(existing) => {
                        check_header(&path, &header, existing)?;
                        false
                    }
                    None => match read_existing_header(&path)? {
                        Some(found) => {
                            check_header(&path, &header, &found)?;
                            planned.insert(path.clone(), found);
                            false
                        }
                        None => {
                            planned.insert(path.clone(), header.clone());
                            true
                        }
                    },
                };

                let cells = row_cells(&header, fields)?;
                pending.push(PendingRow {
                    path: path.clone(),
                    header,
                    cells,
                    write_header,
                });
            }
        }

        if pending.is_empty() {
            return Err(CsvDbError::InvalidRecord(format!(
                "{} codec produced no rows",
                codec.name()
            )));
        }

        fs::create_dir_all(&entity_dir).map_err(|e| CsvDbError::io(&entity_dir, e))?;
        for row in &pending {
            self.append(row)?;
        }

        log_event_with_fields(
            Event::RecordSaved,
            &[
                ("codec", codec.name()),
                ("entity", &entity_dir.display().to_string()),
                ("rows", &pending.len().to_string()),
            ],
        );
        Ok(())
    }

    fn append(&self, row: &PendingRow) -> CsvDbResult<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&row.path)
            .map_err(|e| CsvDbError::io(&row.path, e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if row.write_header {
            writer
                .write_record(&row.header)
                .map_err(|e| CsvDbError::from_csv(&row.path, e))?;
        }
        writer
            .write_record(&row.cells)
            .map_err(|e| CsvDbError::from_csv(&row.path, e))?;
        writer.flush().map_err(|e| CsvDbError::io(&row.path, e))?;

        if self.sync_writes {
            writer
                .get_ref()
                .sync_data()
                .map_err(|e| CsvDbError::io(&row.path, e))?;
        }

        if row.write_header {
            self.metrics.increment_headers_written();
            log_event_with_fields(
                Event::HeaderWritten,
                &[
                    ("columns", &row.header.join(",")),
                    ("path", &row.path.display().to_string()),
                ],
            );
        }
        self.metrics.increment_rows_written();
        Ok(())
    }
}

/// Reads the header line of an existing group file.
///
/// Returns `None` when the file does not exist or is empty.
pub fn read_existing_header(path: &Path) -> CsvDbResult<Option<Vec<String>>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CsvDbError::io(path, e)),
    };

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
    let header: Vec<String> = reader
        .headers()
        .map_err(|e| CsvDbError::from_csv(path, e))?
        .iter()
        .map(str::to_string)
        .collect();

    if header.is_empty() {
        Ok(None)
    } else {
        Ok(Some(header))
    }
}

/// Rejects a row whose `timestamp` would not read back as integer milliseconds.
fn check_timestamp(path: &Path, fields: &Record) -> CsvDbResult<()> {
    let cell = fields
        .get("timestamp")
        .and_then(Value::to_cell)
        .ok_or_else(|| CsvDbError::InvalidRecord("missing scalar field 'timestamp'".into()))?;
    parse_timestamp(path, &cell).map(|_| ())
}

/// Lays out a row's values in header order. Absent columns become empty cells.
fn row_cells(header: &[String], fields: &Record) -> CsvDbResult<Vec<String>> {
    header
        .iter()
        .map(|column| match fields.get(column) {
            None => Ok(String::new()),
            Some(value) => value.to_cell().ok_or_else(|| {
                CsvDbError::InvalidRecord(format!("column '{}' holds a nested value", column))
            }),
        })
        .collect()
}

fn path_component(record: &Record, field: &str) -> CsvDbResult<String> {
    let value = record
        .get(field)
        .and_then(Value::to_cell)
        .ok_or_else(|| CsvDbError::InvalidRecord(format!("missing scalar field '{}'", field)))?;
    if !is_plain_component(&value) {
        return Err(CsvDbError::InvalidRecord(format!(
            "{} '{}' is not a valid directory name",
            field, value
        )));
    }
    Ok(value)
}

fn is_plain_component(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains(|c| c == '/' || c == '\\')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{HwpcReportCodec, PowerReportCodec};
    use tempfile::TempDir;

    fn power(ts: i64, extra: &[(&str, f64)]) -> Record {
        let mut r = Record::new();
        r.insert("timestamp".into(), Value::Int(ts));
        r.insert("sensor".into(), "s1".into());
        r.insert("target".into(), "t1".into());
        r.insert("socket".into(), "0".into());
        r.insert("cpu".into(), "0".into());
        for (k, v) in extra {
            r.insert(k.to_string(), Value::Float(*v));
        }
        r
    }

    fn writer(dir: &TempDir) -> GroupWriter {
        GroupWriter::new(dir.path().to_path_buf(), false, Arc::new(StoreMetrics::new()))
    }

    #[test]
    fn test_layout_and_header() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir);
        w.write(&PowerReportCodec, &power(1, &[("power", 10.5)])).unwrap();

        let path = dir.path().join("s1-t1").join("PowerReport.csv");
        let contents = fs::read_to_string(path).unwrap();
        assert_eq!(
            contents,
            "timestamp,sensor,target,socket,cpu,power\n1,s1,t1,0,0,10.5\n"
        );
    }

    #[test]
    fn test_header_written_once() {
        let dir = TempDir::new().unwrap();
        let metrics = Arc::new(StoreMetrics::new());
        let w = GroupWriter::new(dir.path().to_path_buf(), true, Arc::clone(&metrics));
        for ts in 1..=3 {
            w.write(&PowerReportCodec, &power(ts, &[("power", 1.0)])).unwrap();
        }

        let contents = fs::read_to_string(dir.path().join("s1-t1/PowerReport.csv")).unwrap();
        assert_eq!(contents.lines().count(), 4);
        assert_eq!(contents.matches("timestamp").count(), 1);
        assert_eq!(metrics.snapshot().headers_written, 1);
        assert_eq!(metrics.snapshot().rows_written, 3);
    }

    #[test]
    fn test_mismatched_header_fails_without_writing() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir);
        w.write(&PowerReportCodec, &power(1, &[("power", 1.0)])).unwrap();

        let path = dir.path().join("s1-t1/PowerReport.csv");
        let before = fs::read_to_string(&path).unwrap();

        let err = w
            .write(&PowerReportCodec, &power(2, &[("power", 1.0), ("freq", 2.0)]))
            .unwrap_err();
        assert_eq!(err.code(), "CSVDB_HEADER_MISMATCH");
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_empty_existing_file_gets_header() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("s1-t1")).unwrap();
        fs::write(dir.path().join("s1-t1/PowerReport.csv"), "").unwrap();

        writer(&dir)
            .write(&PowerReportCodec, &power(1, &[("power", 2.0)]))
            .unwrap();
        let contents = fs::read_to_string(dir.path().join("s1-t1/PowerReport.csv")).unwrap();
        assert!(contents.starts_with("timestamp,sensor,target,socket,cpu,power\n"));
    }

    #[test]
    fn test_missing_sensor_rejected() {
        let dir = TempDir::new().unwrap();
        let mut record = power(1, &[("power", 1.0)]);
        record.remove("sensor");
        let err = writer(&dir).write(&PowerReportCodec, &record).unwrap_err();
        assert_eq!(err.code(), "CSVDB_INVALID_RECORD");
    }

    #[test]
    fn test_path_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let mut record = power(1, &[("power", 1.0)]);
        record.insert("target".into(), "../escape".into());
        let err = writer(&dir).write(&PowerReportCodec, &record).unwrap_err();
        assert_eq!(err.code(), "CSVDB_INVALID_RECORD");
    }

    #[test]
    fn test_rejected_save_creates_no_directory() {
        let dir = TempDir::new().unwrap();
        let mut record = power(1, &[("power", 1.0)]);
        record.insert("timestamp".into(), Value::Text("soon".into()));

        let err = writer(&dir).write(&PowerReportCodec, &record).unwrap_err();
        assert_eq!(err.code(), "CSVDB_BAD_TIMESTAMP");
        assert!(!dir.path().join("s1-t1").exists());
    }

    #[test]
    fn test_empty_group_set_rejected() {
        let dir = TempDir::new().unwrap();
        let mut record = Record::new();
        record.insert("timestamp".into(), Value::Int(1));
        record.insert("sensor".into(), "s1".into());
        record.insert("target".into(), "t1".into());
        record.insert("groups".into(), Value::Map(Record::new()));

        let err = writer(&dir).write(&HwpcReportCodec, &record).unwrap_err();
        assert_eq!(err.code(), "CSVDB_INVALID_RECORD");
        assert!(!dir.path().join("s1-t1").exists());
    }

    #[test]
    fn test_delimiter_in_value_is_quoted() {
        let dir = TempDir::new().unwrap();
        let mut record = power(1, &[]);
        record.insert("note".into(), "a,b".into());
        writer(&dir).write(&PowerReportCodec, &record).unwrap();

        let contents = fs::read_to_string(dir.path().join("s1-t1/PowerReport.csv")).unwrap();
        assert!(contents.contains("\"a,b\""));
    }

    #[test]
    fn test_read_existing_header() {
        let dir = TempDir::new().unwrap();
        assert!(read_existing_header(&dir.path().join("none.csv")).unwrap().is_none());

        let path = dir.path().join("h.csv");
        fs::write(&path, "timestamp,sensor\n1,s\n").unwrap();
        assert_eq!(
            read_existing_header(&path).unwrap().unwrap(),
            vec!["timestamp", "sensor"]
        );
    }
}
