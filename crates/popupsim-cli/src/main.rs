// SPDX-License-Identifier: Apache-2.0
//! `popupsim` — batch runner: scenario file (or directory) in, event log
//! and KPI report out.
//!
//! `popupsim --scenarioPath <file|dir> --outputPath <dir> [--verbose]
//! [--debug ERROR|WARNING|INFO|DEBUG]` (§6). Exit codes: `0` success, `1`
//! invalid arguments, scenario, I/O, or simulation failure.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

/// Log level accepted by `--debug`, matching §2's escalation ladder.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum DebugLevel {
    /// Only fatal conditions.
    Error,
    /// Coupling rejections, retries, recoverable anomalies.
    Warning,
    /// Train arrivals, batch formations, run summaries.
    Info,
    /// Per-process suspension and resumption detail.
    Debug,
}

impl DebugLevel {
    fn filter(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON scenario file or a CSV scenario directory.
    #[clap(long = "scenarioPath")]
    scenario_path: PathBuf,

    /// Directory to write `events.csv`/`events.json`/`kpi.csv`/`kpi.json` into.
    #[clap(long = "outputPath")]
    output_path: PathBuf,

    /// Escalate the default log level to `INFO`.
    #[clap(long)]
    verbose: bool,

    /// Explicit log level, overriding `--verbose`.
    #[clap(long, value_enum)]
    debug: Option<DebugLevel>,
}

fn init_logging(args: &Args) {
    let level = args.debug.map_or_else(|| if args.verbose { "info" } else { "warn" }, DebugLevel::filter);
    tracing_subscriber::fmt().with_env_filter(level).init();
}

fn validate_preconditions(args: &Args) -> bool {
    if !args.scenario_path.exists() {
        error!(path = %args.scenario_path.display(), "scenario path does not exist");
        return false;
    }
    if !args.output_path.is_dir() {
        error!(path = %args.output_path.display(), "output directory does not exist");
        return false;
    }
    true
}

fn run(args: &Args) -> bool {
    if !validate_preconditions(args) {
        return false;
    }

    let scenario = match popupsim_config::load_scenario(&args.scenario_path) {
        Ok(scenario) => scenario,
        Err(err) => {
            error!(%err, "failed to load scenario");
            return false;
        }
    };
    info!(scenario_id = %scenario.scenario_id, "scenario loaded");

    let (log, report) = popupsim_core::run_scenario(scenario);
    info!(events = log.len(), "simulation finished");

    let report = match report {
        Ok(report) => report,
        Err(err) => {
            error!(%err, "KPI aggregation failed");
            return false;
        }
    };

    match popupsim_report::write_all(&args.output_path, &log, &report) {
        Ok(()) => {
            info!(output = %args.output_path.display(), "report written");
            true
        }
        Err(err) => {
            error!(%err, "failed to write report");
            false
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    if run(&args) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
