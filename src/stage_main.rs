// src/stage_main.rs

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use bpm_finder::config::resolve_config;
use bpm_finder::harness::{StageKind, run_harness};

#[derive(Parser, Debug)]
#[command(
    name = "stage_harness",
    about = "Run one pipeline stage over JSON lines from stdin"
)]
struct HarnessCli {
    /// Stage under test
    #[arg(value_enum)]
    stage: StageKind,

    /// TOML config file for the stage parameters
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = HarnessCli::parse();
    bpm_finder::logging::init(cli.verbose);

    let config = resolve_config(cli.config.as_deref())?;
    let summary = run_harness(
        cli.stage,
        &config.pipeline,
        io::stdin().lock(),
        io::stdout().lock(),
        io::stderr(),
    )?;
    log::info!(
        "Harness done: {} accepted, {} rejected, {} emitted, {} timed out",
        summary.accepted,
        summary.rejected,
        summary.emitted,
        summary.timed_out
    );
    Ok(())
}
