//! The merge store: file registration, merged reads and grouped writes
//!
//! `CsvDb` owns every cursor it opens. It is meant for one reader and one
//! writer on one thread; reading and writing the same file at once is not
//! supported.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::errors::{CsvDbError, CsvDbResult};
use super::reader::MergeReader;
use super::value::Record;
use super::writer::GroupWriter;
use crate::codec::ReportCodec;
use crate::config::StoreConfig;
use crate::observability::{log_event_with_fields, Event, StoreMetrics};

/// File-backed report store
pub struct CsvDb<C: ReportCodec> {
    /// Root for relative input paths and for written files
    base_path: PathBuf,
    /// Report translator
    codec: C,
    /// Read path
    reader: MergeReader,
    /// Write path
    writer: GroupWriter,
    /// Counters shared by both paths
    metrics: Arc<StoreMetrics>,
}

impl<C: ReportCodec> CsvDb<C> {
    /// Creates a store rooted at `base_path` with default settings.
    pub fn new(codec: C, base_path: impl Into<PathBuf>) -> Self {
        Self::with_config(codec, &StoreConfig::new(base_path))
    }

    /// Creates a store from configuration and registers its input files.
    pub fn with_config(codec: C, config: &StoreConfig) -> Self {
        let metrics = Arc::new(StoreMetrics::new());
        let base_path = config.base_path.clone();

        let mut db = Self {
            reader: MergeReader::new(config.merge_mode, Arc::clone(&metrics)),
            writer: GroupWriter::new(base_path.clone(), config.sync_writes, Arc::clone(&metrics)),
            base_path,
            codec,
            metrics,
        };
        db.add_files(&config.files);
        db
    }

    /// Returns the store counters.
    pub fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }

    /// Resolves an input path: absolute paths are kept, others join the base.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    /// Registers one input file. No I/O happens here.
    pub fn add_file(&mut self, path: impl AsRef<Path>) {
        let resolved = self.resolve(path);
        self.reader.add(resolved);
    }

    /// Registers several input files in order. The first one registered
    /// overall is the primary stream that drives the watermark.
    pub fn add_files<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for path in paths {
            self.add_file(path);
        }
    }

    /// Forgets every registered file.
    ///
    /// Call [`disconnect`](Self::disconnect) first if a read is in progress.
    pub fn clean_files(&mut self) {
        self.reader.clear();
    }

    /// Registered input paths, primary first.
    pub fn files(&self) -> Vec<PathBuf> {
        self.reader.paths().map(Path::to_path_buf).collect()
    }

    /// Opens every registered file and primes the merge.
    ///
    /// Closes any previously open file first. On failure nothing stays open
    /// and no record can be read until `connect` succeeds.
    pub fn connect(&mut self) -> CsvDbResult<()> {
        self.reader.connect()
    }

    /// Closes every open input file.
    pub fn disconnect(&mut self) {
        self.reader.disconnect();
    }

    /// Whether the read path is connected.
    pub fn is_connected(&self) -> bool {
        self.reader.is_connected()
    }

    /// Timestamp the next merged record will carry, if any.
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.reader.watermark()
    }

    /// Returns the next merged record, or `None` at end of stream.
    pub fn next_merged_record(&mut self) -> CsvDbResult<Option<Record>> {
        self.reader.next_merged(&self.codec)
    }

    /// Iterates merged records until end of stream or the first error.
    ///
    /// Connects first when the store is not connected; a connect failure is
    /// the iterator's only item. An already connected store continues from
    /// where it is, so an exhausted one yields nothing until reconnected.
    pub fn iter(&mut self) -> MergedRecords<'_, C> {
        let pending = if self.is_connected() {
            None
        } else {
            self.connect().err()
        };
        MergedRecords {
            db: self,
            pending,
            failed: false,
        }
    }

    /// Appends one record to its group files.
    ///
    /// A failed save leaves every group file unchanged.
    pub fn save(&self, record: &Record) -> CsvDbResult<()> {
        self.writer.write(&self.codec, record).map_err(|e| {
            self.metrics.increment_save_failures();
            log_event_with_fields(
                if matches!(e, CsvDbError::HeaderMismatch { .. }) {
                    Event::HeaderMismatch
                } else {
                    Event::SaveFailed
                },
                &[("code", e.code()), ("message", &e.to_string())],
            );
            e
        })
    }

    /// Saves records one by one, in order.
    ///
    /// Stops at the first failure. Records saved before it stay on disk.
    pub fn save_many<'r, I>(&self, records: I) -> CsvDbResult<()>
    where
        I: IntoIterator<Item = &'r Record>,
    {
        for record in records {
            self.save(record)?;
        }
        Ok(())
    }
}

/// Iterator over merged records, see [`CsvDb::iter`]
pub struct MergedRecords<'a, C: ReportCodec> {
    db: &'a mut CsvDb<C>,
    /// Connect error to report before anything else
    pending: Option<CsvDbError>,
    failed: bool,
}

impl<C: ReportCodec> Iterator for MergedRecords<'_, C> {
    type Item = CsvDbResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Some(e) = self.pending.take() {
            self.failed = true;
            return Some(Err(e));
        }
        match self.db.next_merged_record() {
            Ok(record) => record.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PowerReportCodec;
    use crate::storage::Value;
    use tempfile::TempDir;

    fn power(ts: i64, value: f64) -> Record {
        let mut r = Record::new();
        r.insert("timestamp".into(), Value::Int(ts));
        r.insert("sensor".into(), "s1".into());
        r.insert("target".into(), "t1".into());
        r.insert("socket".into(), "0".into());
        r.insert("cpu".into(), "-1".into());
        r.insert("power".into(), Value::Float(value));
        r
    }

    #[test]
    fn test_relative_paths_join_base() {
        let db = CsvDb::new(PowerReportCodec, "/data/store");
        assert_eq!(db.resolve("a/b.csv"), PathBuf::from("/data/store/a/b.csv"));
        assert_eq!(db.resolve("/abs/c.csv"), PathBuf::from("/abs/c.csv"));
    }

    #[test]
    fn test_add_files_keeps_order() {
        let mut db = CsvDb::new(PowerReportCodec, "/base");
        db.add_file("x.csv");
        db.add_files(["y.csv", "/z.csv"]);
        assert_eq!(
            db.files(),
            vec![
                PathBuf::from("/base/x.csv"),
                PathBuf::from("/base/y.csv"),
                PathBuf::from("/z.csv"),
            ]
        );

        db.clean_files();
        assert!(db.files().is_empty());
    }

    #[test]
    fn test_save_then_replay() {
        let dir = TempDir::new().unwrap();
        let mut db = CsvDb::new(PowerReportCodec, dir.path());
        let records = vec![power(1, 1.5), power(2, 2.5), power(3, 3.5)];
        db.save_many(&records).unwrap();

        db.add_file("s1-t1/PowerReport.csv");
        db.connect().unwrap();
        let replayed: Vec<Record> = db.iter().collect::<CsvDbResult<_>>().unwrap();

        assert_eq!(replayed, records);
        assert_eq!(db.metrics().snapshot().records_merged, 3);
    }

    #[test]
    fn test_save_failure_is_counted() {
        let dir = TempDir::new().unwrap();
        let db = CsvDb::new(PowerReportCodec, dir.path());
        db.save(&power(1, 1.0)).unwrap();

        let mut drifted = power(2, 1.0);
        drifted.insert("freq".into(), Value::Int(2));
        assert!(db.save(&drifted).is_err());
        assert_eq!(db.metrics().snapshot().save_failures, 1);
    }

    #[test]
    fn test_iter_connects_when_unconnected() {
        let dir = TempDir::new().unwrap();
        let mut db = CsvDb::new(PowerReportCodec, dir.path());
        db.save_many(&[power(1, 1.0), power(2, 2.0)]).unwrap();
        db.add_file("s1-t1/PowerReport.csv");

        assert!(!db.is_connected());
        assert_eq!(db.iter().count(), 2);
        assert!(db.is_connected());

        // Exhausted but still connected: nothing more until reconnect
        assert_eq!(db.iter().count(), 0);
        db.disconnect();
        assert_eq!(db.iter().count(), 2);
    }

    #[test]
    fn test_iter_reports_connect_failure_once() {
        let dir = TempDir::new().unwrap();
        let mut db = CsvDb::new(PowerReportCodec, dir.path());
        db.add_file("absent.csv");

        let mut records = db.iter();
        let err = records.next().unwrap().unwrap_err();
        assert_eq!(err.code(), "CSVDB_BAD_FILE_PATH");
        assert!(records.next().is_none());
    }

    #[test]
    fn test_iter_stops_after_error() {
        let dir = TempDir::new().unwrap();
        let mut db = CsvDb::new(PowerReportCodec, dir.path());
        std::fs::write(
            dir.path().join("bad.csv"),
            "timestamp,sensor,target,socket,cpu\n1,s,t,0,0\nlater,s,t,0,0\n",
        )
        .unwrap();
        db.add_file("bad.csv");
        db.connect().unwrap();

        // The bad row is peeked while finishing the first timestamp
        let mut records = db.iter();
        let err = records.next().unwrap().unwrap_err();
        assert_eq!(err.code(), "CSVDB_BAD_TIMESTAMP");
        assert!(records.next().is_none());
    }
}
