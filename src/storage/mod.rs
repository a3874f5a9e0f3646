//! CSV merge store
//!
//! Persists monitoring reports as append-only group files, one directory per
//! `(sensor, target)` entity, and replays a set of those files as one
//! time-ordered stream of merged records.
//!
//! # Layers
//!
//! - `header`: common columns and deterministic header computation
//! - `cursor`: single-file reader with a one-row lookahead
//! - `reader`: k-way merge of many cursors keyed by timestamp
//! - `writer`: group file append with header reconciliation
//! - `store`: [`CsvDb`], composing the read and write paths
//!
//! # Invariants
//!
//! - Every row of a group file matches the file's header exactly
//! - Output timestamps are the distinct timestamps of the primary file,
//!   in file order
//! - A failed `save` leaves group files untouched

mod cursor;
mod errors;
mod header;
mod reader;
mod store;
mod value;
mod writer;

pub use cursor::{parse_timestamp, timestamp_to_datetime, FileCursor, Row};
pub use errors::{CsvDbError, CsvDbResult};
pub use header::{
    check_header, compute_header, is_common_field, missing_common_fields, validate_common_fields,
    COMMON_FIELDS,
};
pub use reader::{MergeMode, MergeReader};
pub use store::{CsvDb, MergedRecords};
pub use value::{deep_merge, Record, Value};
pub use writer::{read_existing_header, GroupWriter};
