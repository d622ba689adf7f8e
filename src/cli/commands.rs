//! CLI command implementations

use std::io::Write;
use std::path::Path;

use serde_json::json;

use super::args::Command;
use super::config::Config;
use super::errors::{CliError, CliResult};
use crate::forge::{ConflictSimulationDriver, SimulationReport};
use crate::observability::{init_logging, Event, LogFormat};
use crate::observe;
use crate::revision::RevisionId;

/// Main entry point for CLI
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Simulate { config, json_logs } => {
            let format = if json_logs {
                LogFormat::Json
            } else {
                LogFormat::Text
            };
            init_logging(format, "info");
            let report = simulate(&config)?;
            write_report(&mut std::io::stdout(), &report)?;
            if !report.is_done() {
                let reason = report
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| format!("ended in state {}", report.state.state_name()));
                return Err(CliError::simulation_failed(reason));
            }
            Ok(())
        }
        Command::ParseRev { rev } => {
            let value = parse_rev(&rev)?;
            writeln!(std::io::stdout(), "{}", value)?;
            Ok(())
        }
    }
}

/// Loads the config at `config_path` and runs its scenario to completion.
///
/// The report is returned for both `Done` and `Failed` runs; only setup
/// failures are errors.
pub fn simulate(config_path: &Path) -> CliResult<SimulationReport> {
    let config = Config::load(config_path)?;
    observe!(Event::ConfigLoaded, path = %config_path.display());

    let store = config.build_store()?;
    let scenario = config.to_scenario();

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::io_error(format!("Failed to create tokio runtime: {}", e)))?;

    let driver = ConflictSimulationDriver::new(store);
    Ok(rt.block_on(driver.run(&scenario)))
}

/// Decomposes `rev` into its generation and hash.
pub fn parse_rev(rev: &str) -> CliResult<serde_json::Value> {
    let parsed = RevisionId::parse(rev).map_err(|e| CliError::invalid_revision(e.to_string()))?;
    Ok(json!({
        "rev": parsed.to_string(),
        "generation": parsed.generation(),
        "hash": parsed.hash(),
    }))
}

fn write_report<W: Write>(out: &mut W, report: &SimulationReport) -> CliResult<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
