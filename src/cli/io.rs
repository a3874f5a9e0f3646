//! JSON lines I/O for the CLI
//!
//! - Input: one JSON record per line on stdin, blank lines ignored
//! - Output: one JSON object per line on stdout

use std::io::{BufRead, Write};

use serde::Serialize;

use super::errors::{CliError, CliResult};
use crate::storage::Record;

/// Parse JSON records, one per non-blank line
pub fn read_records<R: BufRead>(input: R) -> impl Iterator<Item = CliResult<Record>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| line.as_ref().map_or(true, |l| !l.trim().is_empty()))
        .map(|(index, line)| {
            let line = line.map_err(CliError::from)?;
            serde_json::from_str(&line).map_err(|e| CliError::bad_input(index + 1, e))
        })
}

/// Write one value as a JSON line
pub fn write_json_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
