//! CLI argument definitions using clap
//!
//! Commands:
//! - revforge simulate --config <path> [--json-logs]
//! - revforge parse-rev <rev>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// revforge - force conflicting revisions into an MVCC document store
#[derive(Parser, Debug)]
#[command(name = "revforge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a conflict scenario and print its report as JSON
    Simulate {
        /// Path to configuration file
        #[arg(long, default_value = "./revforge.json")]
        config: PathBuf,

        /// Emit logs as JSON lines on stderr
        #[arg(long)]
        json_logs: bool,
    },

    /// Parse a revision string and print its generation and hash
    ParseRev {
        /// Revision in `<generation>-<hash>` form
        rev: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
