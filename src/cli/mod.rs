//! CLI module for csvdb
//!
//! - save: append stdin records to the store
//! - replay: print merged records of the configured files

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{replay, replay_records, run, run_command, save, save_records};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_records, write_json_line};
