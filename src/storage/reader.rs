//! Timestamp-synchronized merge over many group files
//!
//! Every registered file is read through its own [`FileCursor`]. One call to
//! [`MergeReader::next_merged`] produces one record: the deep union of every
//! row, across every file, whose timestamp equals the current watermark.
//!
//! The watermark only moves with the first registered file (the primary).
//! Other files are merged up to it and never set it, so the output holds one
//! record per distinct timestamp of the primary file.
//!
//! # States
//!
//! ```text
//! Unconnected --connect--> Connected(watermark) --next--> ... --> Exhausted
//! ```
//!
//! Only `connect` leaves `Unconnected` or `Exhausted`.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::cursor::FileCursor;
use super::errors::{CsvDbError, CsvDbResult};
use super::header::validate_common_fields;
use super::value::{deep_merge, Record};
use crate::codec::ReportCodec;
use crate::observability::{log_event_with_fields, Event, StoreMetrics};

/// What to do with a row whose timestamp is behind the watermark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Consume and drop the row, logging a warning
    #[default]
    Lenient,
    /// Fail the merge step with `OutOfOrderRow`
    Strict,
}

/// One registered input file
struct FileEntry {
    /// Resolved path
    path: PathBuf,
    /// Open cursor, `None` until `connect`
    cursor: Option<FileCursor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeState {
    Unconnected,
    /// `None` when the primary file has no rows
    Connected { watermark: Option<DateTime<Utc>> },
    Exhausted,
}

/// Pull-based k-way merge over the registered files
pub struct MergeReader {
    entries: Vec<FileEntry>,
    state: MergeState,
    mode: MergeMode,
    metrics: Arc<StoreMetrics>,
}

impl MergeReader {
    /// Creates a reader with no files.
    pub fn new(mode: MergeMode, metrics: Arc<StoreMetrics>) -> Self {
        Self {
            entries: Vec::new(),
            state: MergeState::Unconnected,
            mode,
            metrics,
        }
    }

    /// Appends a file. No I/O happens until `connect`.
    pub fn add(&mut self, path: PathBuf) {
        self.entries.push(FileEntry { path, cursor: None });
    }

    /// Forgets every file.
    ///
    /// Must not be called while a merge is in progress.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.state = MergeState::Unconnected;
    }

    /// Registered paths, primary first.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|e| e.path.as_path())
    }

    /// Whether `connect` succeeded and has not been undone.
    pub fn is_connected(&self) -> bool {
        !matches!(self.state, MergeState::Unconnected)
    }

    /// Whether the stream has ended.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, MergeState::Exhausted)
    }

    /// The timestamp the next step will merge at.
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        match self.state {
            MergeState::Connected { watermark } => watermark,
            _ => None,
        }
    }

    /// Closes every open cursor.
    pub fn disconnect(&mut self) {
        for entry in &mut self.entries {
            entry.cursor = None;
        }
        self.state = MergeState::Unconnected;
    }

    /// (Re)opens every file, primes its lookahead and sets the watermark.
    ///
    /// Any failure leaves the reader disconnected with no file open.
    ///
    /// # Errors
    ///
    /// - `BadFilePath` if a file cannot be opened
    /// - `BadCommonKeys` if a file's header lacks a common column
    /// - `BadTimestamp` if the primary file's first timestamp is unreadable
    pub fn connect(&mut self) -> CsvDbResult<()> {
        self.disconnect();

        let result = self.open_all();
        if let Err(ref e) = result {
            self.disconnect();
            log_event_with_fields(
                Event::ConnectFailed,
                &[("code", e.code()), ("message", &e.to_string())],
            );
        }
        result
    }

    fn open_all(&mut self) -> CsvDbResult<()> {
        for entry in &mut self.entries {
            let cursor = FileCursor::open(&entry.path)?;

            // A file with no header at all is simply exhausted
            if !cursor.header().is_empty() {
                validate_common_fields(&entry.path, cursor.header())?;
            }

            log_event_with_fields(
                Event::FileOpened,
                &[
                    ("path", &entry.path.display().to_string()),
                    ("exhausted", if cursor.is_exhausted() { "true" } else { "false" }),
                ],
            );
            entry.cursor = Some(cursor);
        }

        let watermark = match self.entries.first().and_then(|e| e.cursor.as_ref()) {
            Some(primary) => primary.peek_time()?,
            None => None,
        };
        self.state = MergeState::Connected { watermark };

        log_event_with_fields(
            Event::StoreConnected,
            &[
                ("files", &self.entries.len().to_string()),
                (
                    "watermark",
                    &watermark.map(|w| w.timestamp_millis().to_string()).unwrap_or_default(),
                ),
            ],
        );
        Ok(())
    }

    /// Produces the merged record at the current watermark.
    ///
    /// Returns `Ok(None)` at end of stream, and also when not connected.
    pub fn next_merged<C: ReportCodec + ?Sized>(&mut self, codec: &C) -> CsvDbResult<Option<Record>> {
        let watermark = match self.state {
            MergeState::Connected {
                watermark: Some(watermark),
            } => watermark,
            MergeState::Connected { watermark: None } => {
                self.finish();
                return Ok(None);
            }
            MergeState::Unconnected | MergeState::Exhausted => return Ok(None),
        };

        let mut merged = Record::new();
        let mut next_watermark = None;

        for (index, entry) in self.entries.iter_mut().enumerate() {
            let Some(cursor) = entry.cursor.as_mut() else {
                continue;
            };

            while let Some(ts) = cursor.peek_time()? {
                match ts.cmp(&watermark) {
                    Ordering::Greater => {
                        if index == 0 {
                            next_watermark = Some(ts);
                        }
                        break;
                    }
                    Ordering::Equal => {
                        if let Some(row) = cursor.advance()? {
                            let fragment = codec.from_csvdb(cursor.file_name(), &row)?;
                            deep_merge(&mut merged, fragment);
                            self.metrics.increment_rows_read();
                        }
                    }
                    Ordering::Less => match self.mode {
                        MergeMode::Strict => {
                            return Err(CsvDbError::OutOfOrderRow {
                                path: entry.path.clone(),
                                timestamp: ts.timestamp_millis(),
                                watermark: watermark.timestamp_millis(),
                            });
                        }
                        MergeMode::Lenient => {
                            cursor.advance()?;
                            self.metrics.increment_rows_skipped();
                            log_event_with_fields(
                                Event::StaleRowSkipped,
                                &[
                                    ("path", &entry.path.display().to_string()),
                                    ("timestamp", &ts.timestamp_millis().to_string()),
                                    ("watermark", &watermark.timestamp_millis().to_string()),
                                ],
                            );
                        }
                    },
                }
            }
        }

        if merged.is_empty() {
            self.finish();
            return Ok(None);
        }

        // Without a later primary row the watermark stays put, and the
        // following step finds nothing left to merge.
        if let Some(next) = next_watermark {
            self.state = MergeState::Connected {
                watermark: Some(next),
            };
        }

        self.metrics.increment_records_merged();
        log_event_with_fields(
            Event::MergedRecord,
            &[("timestamp", &watermark.timestamp_millis().to_string())],
        );
        Ok(Some(merged))
    }

    fn finish(&mut self) {
        self.state = MergeState::Exhausted;
        log_event_with_fields(
            Event::StreamExhausted,
            &[("files", &self.entries.len().to_string())],
        );
    }
}
