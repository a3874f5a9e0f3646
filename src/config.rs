//! Store configuration
//!
//! Loaded from a JSON file:
//!
//! ```json
//! {
//!   "base_path": "/var/lib/csvdb",
//!   "files": ["sensor-all/PowerReport.csv"],
//!   "merge_mode": "lenient",
//!   "sync_writes": true,
//!   "codec": "power",
//!   "log_level": "info"
//! }
//! ```
//!
//! Only `base_path` is required.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::codec::CodecKind;
use crate::storage::MergeMode;
use crate::observability::Severity;

/// Base directory used when none is given
pub const DEFAULT_BASE_PATH: &str = "/tmp/csvdbtest";

/// Errors while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Root for written files and relative input paths (required)
    pub base_path: PathBuf,

    /// Input files, primary first
    #[serde(default)]
    pub files: Vec<PathBuf>,

    /// Handling of rows behind the watermark
    #[serde(default)]
    pub merge_mode: MergeMode,

    /// fsync every appended row
    #[serde(default = "default_sync_writes")]
    pub sync_writes: bool,

    /// Report codec
    #[serde(default)]
    pub codec: CodecKind,

    /// Lowest severity written to the log
    #[serde(default)]
    pub log_level: Severity,
}

fn default_sync_writes() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_PATH)
    }
}

impl StoreConfig {
    /// Configuration with defaults and the given base directory
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            files: Vec::new(),
            merge_mode: MergeMode::default(),
            sync_writes: default_sync_writes(),
            codec: CodecKind::default(),
            log_level: Severity::default(),
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate configuration text
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.base_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("base_path must not be empty".into()));
        }
        if self.files.iter().any(|f| f.as_os_str().is_empty()) {
            return Err(ConfigError::Invalid("files must not contain empty paths".into()));
        }
        Ok(())
    }
}
