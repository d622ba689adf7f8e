//! CLI module for revforge
//!
//! Provides command-line interface for:
//! - simulate: Run a conflict scenario described by a config file
//! - parse-rev: Validate and decompose a revision string

mod args;
mod commands;
mod config;
mod errors;

pub use args::{Cli, Command};
pub use commands::{parse_rev, run, run_command, simulate};
pub use config::{Config, ScenarioSection, StoreKind, StoreSection};
pub use errors::{CliError, CliErrorCode, CliResult};
