//! CLI argument definitions using clap
//!
//! Commands:
//! - csvdb save --config <path>
//! - csvdb replay --config <path> [--file <path>]...

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// csvdb - file-backed store for monitoring reports
#[derive(Parser, Debug)]
#[command(name = "csvdb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Save JSON records read line by line from stdin
    Save {
        /// Path to configuration file
        #[arg(long, default_value = "./csvdb.json")]
        config: PathBuf,
    },

    /// Print the merged records of the configured files as JSON lines
    Replay {
        /// Path to configuration file
        #[arg(long, default_value = "./csvdb.json")]
        config: PathBuf,

        /// Extra input file, registered after the configured ones
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
