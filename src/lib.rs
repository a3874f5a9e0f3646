//! csvdb - file-backed store for monitoring reports
//!
//! Writes incoming reports to append-only CSV group files, one directory per
//! `(sensor, target)` entity, and replays any set of those files as one
//! stream of records merged by timestamp.
//!
//! # Example
//!
//! ```no_run
//! use csvdb::codec::PowerReportCodec;
//! use csvdb::storage::{CsvDb, Record, Value};
//!
//! # fn main() -> csvdb::storage::CsvDbResult<()> {
//! let mut db = CsvDb::new(PowerReportCodec, "/tmp/csvdbtest");
//!
//! let mut report = Record::new();
//! report.insert("timestamp".into(), Value::Int(1_700_000_000_000));
//! report.insert("sensor".into(), "rapl".into());
//! report.insert("target".into(), "all".into());
//! report.insert("socket".into(), "0".into());
//! report.insert("cpu".into(), "-1".into());
//! report.insert("power".into(), Value::Float(42.0));
//! db.save(&report)?;
//!
//! db.add_file("rapl-all/PowerReport.csv");
//! db.connect()?;
//! while let Some(record) = db.next_merged_record()? {
//!     println!("{:?}", record);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod codec;
pub mod config;
pub mod storage;
pub mod observability;
