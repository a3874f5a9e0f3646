//! Merge store error types
//!
//! Error codes:
//! - CSVDB_BAD_FILE_PATH
//! - CSVDB_BAD_COMMON_KEYS
//! - CSVDB_HEADER_MISMATCH
//! - CSVDB_BAD_TIMESTAMP
//! - CSVDB_MALFORMED_ROW
//! - CSVDB_INVALID_RECORD
//! - CSVDB_OUT_OF_ORDER_ROW
//! - CSVDB_CODEC_ERROR
//! - CSVDB_IO_ERROR
//!
//! Every error is fatal to the operation that raised it. Nothing is retried
//! internally.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for merge store operations
pub type CsvDbResult<T> = Result<T, CsvDbError>;

/// Merge store errors
#[derive(Debug, Error)]
pub enum CsvDbError {
    /// A registered file could not be opened for reading
    #[error("Cannot open {}: {source}", path.display())]
    BadFilePath {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A file's header lacks one or more of the common columns
    #[error("Wrong columns keys in {}: missing {missing:?}", path.display())]
    BadCommonKeys { path: PathBuf, missing: Vec<String> },

    /// An existing group file was written with a different header
    #[error("Header are not the same in {}: expected {expected:?}, found {found:?}", path.display())]
    HeaderMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// A timestamp cell is not an integer, or is out of range
    #[error("Bad timestamp '{value}' in {}", path.display())]
    BadTimestamp { path: PathBuf, value: String },

    /// The CSV layer rejected a row
    #[error("Malformed row in {}: {source}", path.display())]
    MalformedRow {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A record handed to the writer cannot be laid out as rows
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Strict mode: a row sits behind the current watermark
    #[error("Row at {timestamp} in {} is behind watermark {watermark}", path.display())]
    OutOfOrderRow {
        path: PathBuf,
        timestamp: i64,
        watermark: i64,
    },

    /// Codec-specific translation failure
    #[error("Codec error: {0}")]
    Codec(String),

    /// Generic filesystem failure
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CsvDbError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CsvDbError::Io {
            path: path.into(),
            source,
        }
    }

    /// Map a CSV error, keeping plain I/O failures as `Io`
    pub fn from_csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        let path = path.into();
        let io_error = match source.kind() {
            csv::ErrorKind::Io(e) => Some(io::Error::new(e.kind(), e.to_string())),
            _ => None,
        };
        match io_error {
            Some(source) => CsvDbError::Io { path, source },
            None => CsvDbError::MalformedRow { path, source },
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            CsvDbError::BadFilePath { .. } => "CSVDB_BAD_FILE_PATH",
            CsvDbError::BadCommonKeys { .. } => "CSVDB_BAD_COMMON_KEYS",
            CsvDbError::HeaderMismatch { .. } => "CSVDB_HEADER_MISMATCH",
            CsvDbError::BadTimestamp { .. } => "CSVDB_BAD_TIMESTAMP",
            CsvDbError::MalformedRow { .. } => "CSVDB_MALFORMED_ROW",
            CsvDbError::InvalidRecord(_) => "CSVDB_INVALID_RECORD",
            CsvDbError::OutOfOrderRow { .. } => "CSVDB_OUT_OF_ORDER_ROW",
            CsvDbError::Codec(_) => "CSVDB_CODEC_ERROR",
            CsvDbError::Io { .. } => "CSVDB_IO_ERROR",
        }
    }

    /// Whether the error came from the read path's `connect`
    pub fn is_connect_error(&self) -> bool {
        matches!(
            self,
            CsvDbError::BadFilePath { .. } | CsvDbError::BadCommonKeys { .. }
        )
    }
}
