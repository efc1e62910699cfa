// src/main.rs

use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};

use bpm_finder::cli::Cli;
use bpm_finder::config::resolve_config;
use bpm_finder::pipeline::{Assembly, ShutdownReport, assemble};
use bpm_finder::source::{CaptureSource, FileAudioSource};

const TICK: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    let cli = Cli::parse();
    bpm_finder::logging::init(cli.verbose);

    let mut config = resolve_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    let params = &config.pipeline;
    log::info!(
        "bpm_finder: {} Hz, {} samples/chunk, band-pass {}-{} Hz",
        params.sample_rate,
        params.chunk_size,
        params.band_pass_low_cutoff,
        params.band_pass_high_cutoff
    );

    let Assembly {
        mut pipeline,
        bpm,
        recordings,
    } = match &cli.input {
        Some(path) => {
            let mut source = FileAudioSource::new(path, params.sample_rate, params.chunk_size);
            if cli.realtime {
                source = source.with_realtime_pacing();
            }
            assemble(&config, source)?
        }
        None => assemble(
            &config,
            CaptureSource::new(params.sample_rate, params.chunk_size),
        )?,
    };

    pipeline.start()?;

    let deadline = cli
        .duration
        .map(|secs| Instant::now() + Duration::from_secs_f64(secs.max(0.0)));
    if cli.input.is_some() {
        while !pipeline.source_finished() && !deadline.is_some_and(|d| Instant::now() >= d) {
            std::thread::sleep(TICK);
        }
    } else {
        println!("🎧 Listening... press [Q] to stop");
        wait_for_quit(deadline)?;
    }

    let report = pipeline.shutdown(config.pipeline.drain_timeout());
    print_report(&report);
    for (name, stats) in &recordings {
        log::info!(
            "{}: {} items written, {} failed",
            name,
            stats.written(),
            stats.failed_writes()
        );
    }

    match bpm.latest() {
        Some(value) => println!("🥁 Final BPM: {:.1}", value),
        None => println!("🥁 Not enough audio for a tempo estimate"),
    }
    Ok(())
}

/// Restores the terminal even when the key loop bails out early.
struct RawMode;

impl RawMode {
    fn enable() -> Result<Self> {
        enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

fn wait_for_quit(deadline: Option<Instant>) -> Result<()> {
    let _raw = RawMode::enable()?;
    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(());
        }
        if event::poll(TICK)? {
            if let Event::Key(ev) = event::read()? {
                if ev.kind != KeyEventKind::Press {
                    continue;
                }
                let ctrl_c = ev.code == KeyCode::Char('c')
                    && ev.modifiers.contains(KeyModifiers::CONTROL);
                if ctrl_c || matches!(ev.code, KeyCode::Char('q') | KeyCode::Char('Q')) {
                    return Ok(());
                }
            }
        }
    }
}

fn print_report(report: &ShutdownReport) {
    for s in &report.stages {
        log::info!(
            "  {:<28} pushed {:>7}  processed {:>7}  queued {:>4}",
            s.name,
            s.pushed,
            s.processed,
            s.queued
        );
    }
    if report.is_clean() {
        log::info!("✅ Shutdown complete, nothing lost");
    } else {
        log::warn!(
            "⚠️ Shutdown incomplete: {} items lost, timed out: {:?}, panicked: {:?}",
            report.lost_items(),
            report.timed_out,
            report.panicked
        );
    }
}
