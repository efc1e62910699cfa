// src/harness/mod.rs

//! Line-oriented JSON driver for running a single stage in isolation.
//!
//! Each input line is one JSON object: `{"rawAudio": [...]}` for the ingest
//! stage, a full `PipelineResult` for every other stage. `exit` ends the run.
//! Each emitted output is written as one JSON line.

use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::dsp::result::{AudioChunk, PipelineResult};
use crate::dsp::stages::{
    BandPassStage, BpmStage, DominantIntervalStage, EnergyStage, IngestStage,
    InterOnsetIntervalStage, OnsetStage, PeakPickerStage,
};
use crate::stream::{Stage, StageRunner, Subscriber, wait_until};

pub const RESULT_WAIT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StageKind {
    Ingest,
    BandPass,
    Energy,
    Onset,
    Peaks,
    Intervals,
    Dominant,
    Bpm,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HarnessSummary {
    pub accepted: usize,
    pub rejected: usize,
    pub emitted: usize,
    /// Lines whose result did not arrive within the wait.
    pub timed_out: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAudioLine {
    raw_audio: AudioChunk,
}

/// Buffers whatever the stage under test publishes.
struct Collector<T>(Mutex<Vec<T>>);

impl<T: Send> Subscriber<T> for Collector<T> {
    fn push(&self, item: T) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item);
    }
}

impl<T> Collector<T> {
    fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Runs `kind` over `input` until EOF or `exit`. Results go to `output`,
/// complaints about bad lines to `errors`.
pub fn run_harness<R, W, E>(
    kind: StageKind,
    config: &PipelineConfig,
    input: R,
    output: W,
    errors: E,
) -> Result<HarnessSummary>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    let record = |line: &str| serde_json::from_str::<PipelineResult>(line);
    match kind {
        StageKind::Ingest => drive(
            IngestStage::new(config.chunk_params()),
            |line| serde_json::from_str::<RawAudioLine>(line).map(|l| l.raw_audio),
            input,
            output,
            errors,
        ),
        StageKind::BandPass => drive(
            BandPassStage::new(config.band_pass_params()),
            record,
            input,
            output,
            errors,
        ),
        StageKind::Energy => drive(EnergyStage, record, input, output, errors),
        StageKind::Onset => drive(OnsetStage::new(), record, input, output, errors),
        StageKind::Peaks => drive(
            PeakPickerStage::new(config.window_seconds, config.peak_threshold),
            record,
            input,
            output,
            errors,
        ),
        StageKind::Intervals => drive(InterOnsetIntervalStage, record, input, output, errors),
        StageKind::Dominant => drive(DominantIntervalStage, record, input, output, errors),
        StageKind::Bpm => drive(BpmStage::new(), record, input, output, errors),
    }
}

fn drive<S, P, R, W, E>(
    stage: S,
    parse: P,
    mut input: R,
    mut output: W,
    mut errors: E,
) -> Result<HarnessSummary>
where
    S: Stage,
    S::Output: Serialize,
    P: Fn(&str) -> serde_json::Result<S::Input>,
    R: BufRead,
    W: Write,
    E: Write,
{
    let mut runner = StageRunner::new(stage);
    let collector: Arc<Collector<S::Output>> = Arc::new(Collector(Mutex::new(Vec::new())));
    runner.subscribe(collector.clone());
    let inbox = runner.inbox();
    runner.start()?;
    log::info!("🧪 Harness running {}", runner.stats().name);

    let mut summary = HarnessSummary::default();
    let mut buf = Vec::new();
    let mut number = 0usize;
    loop {
        buf.clear();
        let read = input
            .read_until(b'\n', &mut buf)
            .context("Failed to read harness input")?;
        if read == 0 {
            break;
        }
        number += 1;

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                summary.rejected += 1;
                writeln!(errors, "error: line {}: {}", number, e)?;
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        if line == "exit" {
            break;
        }

        let item = match parse(line) {
            Ok(item) => item,
            Err(e) => {
                summary.rejected += 1;
                writeln!(errors, "error: line {}: {}", number, e)?;
                continue;
            }
        };
        summary.accepted += 1;

        let target = inbox.pushed() + 1;
        inbox.push(item);
        if !wait_until(RESULT_WAIT, POLL, || inbox.processed() >= target) {
            summary.timed_out += 1;
            writeln!(errors, "warning: line {}: no result within {:?}", number, RESULT_WAIT)?;
        }

        for out in collector.take() {
            serde_json::to_writer(&mut output, &out)?;
            writeln!(output)?;
            summary.emitted += 1;
        }
        output.flush()?;
    }

    runner.stop();
    for out in collector.take() {
        serde_json::to_writer(&mut output, &out)?;
        writeln!(output)?;
        summary.emitted += 1;
    }
    output.flush()?;
    Ok(summary)
}
