//! Observable events for csvdb
//!
//! Events are explicit and typed. Each maps to one stable log name.

use std::fmt;

use super::logger::Severity;

/// Observable events in csvdb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded
    ConfigLoaded,

    // Read path
    /// A registered file was opened and primed
    FileOpened,
    /// Every registered file opened, watermark set
    StoreConnected,
    /// `connect` failed, store unusable until the next `connect`
    ConnectFailed,
    /// One merged record produced
    MergedRecord,
    /// A row behind the watermark was dropped (lenient mode)
    StaleRowSkipped,
    /// No file has data at the watermark any more
    StreamExhausted,

    // Write path
    /// Header line written to a new group file
    HeaderWritten,
    /// Record appended to its group files
    RecordSaved,
    /// Existing group file header disagrees with the record
    HeaderMismatch,
    /// `save` failed
    SaveFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::FileOpened => "CSV_FILE_OPENED",
            Event::StoreConnected => "CSVDB_CONNECTED",
            Event::ConnectFailed => "CSVDB_CONNECT_FAILED",
            Event::MergedRecord => "MERGED_RECORD",
            Event::StaleRowSkipped => "STALE_ROW_SKIPPED",
            Event::StreamExhausted => "STREAM_EXHAUSTED",

            Event::HeaderWritten => "HEADER_WRITTEN",
            Event::RecordSaved => "RECORD_SAVED",
            Event::HeaderMismatch => "HEADER_MISMATCH",
            Event::SaveFailed => "SAVE_FAILED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::MergedRecord | Event::RecordSaved | Event::FileOpened => Severity::Trace,
            Event::StaleRowSkipped => Severity::Warn,
            Event::ConnectFailed | Event::HeaderMismatch | Event::SaveFailed => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
