//! CLI command implementations
//!
//! `save` feeds stdin records to the write path; `replay` drains the read
//! path to stdout. Store failures are logged and returned, never retried.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::codec::{CodecKind, HwpcReportCodec, PowerReportCodec, ReportCodec};
use crate::config::StoreConfig;
use crate::storage::CsvDb;
use crate::observability::{log_event_with_fields, Event, Logger};

use super::args::Command;
use super::errors::CliResult;
use super::io::{read_records, write_json_line};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Save { config } => save(&config),
        Command::Replay { config, files } => replay(&config, &files),
    }
}

fn load_config(path: &Path) -> CliResult<StoreConfig> {
    let config = StoreConfig::load(path)?;
    Logger::set_min_severity(config.log_level);
    log_event_with_fields(
        Event::ConfigLoaded,
        &[
            ("base_path", &config.base_path.display().to_string()),
            ("codec", &format!("{:?}", config.codec).to_lowercase()),
            ("config", &path.display().to_string()),
        ],
    );
    Ok(config)
}

/// Save every stdin record, then print how many were saved
pub fn save(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    let saved = match config.codec {
        CodecKind::Power => save_records(&CsvDb::with_config(PowerReportCodec, &config), stdin.lock())?,
        CodecKind::Hwpc => save_records(&CsvDb::with_config(HwpcReportCodec, &config), stdin.lock())?,
    };
    write_json_line(&mut stdout, &json!({ "saved": saved }))?;
    stdout.flush()?;
    Ok(())
}

/// Replay the configured files plus `extra_files` to stdout
pub fn replay(config_path: &Path, extra_files: &[PathBuf]) -> CliResult<()> {
    let config = load_config(config_path)?;
    let mut stdout = io::stdout().lock();
    let count = match config.codec {
        CodecKind::Power => {
            replay_records(&mut CsvDb::with_config(PowerReportCodec, &config), extra_files, &mut stdout)?
        }
        CodecKind::Hwpc => {
            replay_records(&mut CsvDb::with_config(HwpcReportCodec, &config), extra_files, &mut stdout)?
        }
    };
    stdout.flush()?;
    Logger::info("REPLAY_COMPLETE", &[("records", &count.to_string())]);
    Ok(())
}

/// Saves each record read from `input`; stops at the first failure.
pub fn save_records<C: ReportCodec, R: BufRead>(db: &CsvDb<C>, input: R) -> CliResult<usize> {
    let mut saved = 0;
    for record in read_records(input) {
        db.save(&record?)?;
        saved += 1;
    }
    Ok(saved)
}

/// Writes every merged record to `out` as a JSON line.
pub fn replay_records<C: ReportCodec, W: Write>(
    db: &mut CsvDb<C>,
    extra_files: &[PathBuf],
    out: &mut W,
) -> CliResult<usize> {
    db.add_files(extra_files);
    db.connect()?;

    let mut count = 0;
    for record in db.iter() {
        write_json_line(out, &record?)?;
        count += 1;
    }
    Ok(count)
}
