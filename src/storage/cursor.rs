//! Single-file sequential reader with a one-row lookahead
//!
//! The merge reader decides whether to consume a row by looking at its
//! timestamp first, so each cursor always holds the next unread row in
//! memory. An exhausted cursor holds nothing.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};

use super::errors::{CsvDbError, CsvDbResult};

/// A raw row: column name to cell text
pub type Row = BTreeMap<String, String>;

/// Converts an integer millisecond timestamp to the watermark representation
pub fn timestamp_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Parses a `timestamp` cell into a point in time
pub fn parse_timestamp(path: &Path, cell: &str) -> CsvDbResult<DateTime<Utc>> {
    cell.trim()
        .parse::<i64>()
        .ok()
        .and_then(timestamp_to_datetime)
        .ok_or_else(|| CsvDbError::BadTimestamp {
            path: path.to_path_buf(),
            value: cell.to_string(),
        })
}

/// Sequential reader over one group file.
pub struct FileCursor {
    /// Path the cursor was opened on
    path: PathBuf,
    /// Final path component, handed to the codec with every row
    file_name: String,
    /// CSV reader over the open file
    reader: csv::Reader<File>,
    /// Column names from the first line, empty for an empty file
    header: Vec<String>,
    /// Next unread row, `None` once the file is exhausted
    lookahead: Option<Row>,
    /// Reused scratch record
    scratch: csv::StringRecord,
    /// Rows handed out so far
    rows_consumed: u64,
}

impl FileCursor {
    /// Opens `path`, reads its header and primes the lookahead.
    ///
    /// An empty file is not an error: its cursor starts exhausted.
    ///
    /// # Errors
    ///
    /// - `BadFilePath` if the file cannot be opened
    /// - `MalformedRow` / `Io` if the header or first row cannot be read
    pub fn open(path: &Path) -> CsvDbResult<Self> {
        let file = File::open(path).map_err(|source| CsvDbError::BadFilePath {
            path: path.to_path_buf(),
            source,
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(file);

        let header: Vec<String> = reader
            .headers()
            .map_err(|e| CsvDbError::from_csv(path, e))?
            .iter()
            .map(str::to_string)
            .collect();

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut cursor = Self {
            path: path.to_path_buf(),
            file_name,
            reader,
            header,
            lookahead: None,
            scratch: csv::StringRecord::new(),
            rows_consumed: 0,
        };
        cursor.lookahead = cursor.read_row()?;
        Ok(cursor)
    }

    /// Returns the file's base name (e.g. `PowerReport.csv`).
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the header read at open time.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Returns the lookahead row without consuming it.
    pub fn peek(&self) -> Option<&Row> {
        self.lookahead.as_ref()
    }

    /// Whether every row has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.lookahead.is_none()
    }

    /// Number of rows consumed through [`advance`](Self::advance).
    pub fn rows_consumed(&self) -> u64 {
        self.rows_consumed
    }

    /// Parses the lookahead row's timestamp.
    ///
    /// Returns `Ok(None)` when the cursor is exhausted.
    pub fn peek_time(&self) -> CsvDbResult<Option<DateTime<Utc>>> {
        match &self.lookahead {
            None => Ok(None),
            Some(row) => {
                let cell = row.get("timestamp").map(String::as_str).unwrap_or("");
                parse_timestamp(&self.path, cell).map(Some)
            }
        }
    }

    /// Takes the lookahead row and reads the following one in its place.
    pub fn advance(&mut self) -> CsvDbResult<Option<Row>> {
        let next = self.read_row()?;
        let current = std::mem::replace(&mut self.lookahead, next);
        if current.is_some() {
            self.rows_consumed += 1;
        }
        Ok(current)
    }

    fn read_row(&mut self) -> CsvDbResult<Option<Row>> {
        let more = self
            .reader
            .read_record(&mut self.scratch)
            .map_err(|e| CsvDbError::from_csv(&self.path, e))?;
        if !more {
            return Ok(None);
        }

        let row = self
            .header
            .iter()
            .zip(self.scratch.iter())
            .map(|(column, cell)| (column.clone(), cell.to_string()))
            .collect();
        Ok(Some(row))
    }
}
