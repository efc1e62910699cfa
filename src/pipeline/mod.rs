// src/pipeline/mod.rs

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::{Config, RecordingConfig};
use crate::dsp::result::{AudioChunk, PipelineResult};
use crate::dsp::stages::{
    BandPassStage, BpmStage, DominantIntervalStage, EnergyStage, IngestStage,
    InterOnsetIntervalStage, OnsetStage, PeakPickerStage,
};
use crate::sink::{BinFileSink, BpmMonitor, BpmReading, SignalTap, SinkStats, WavFileSink};
use crate::source::AudioSource;

pub mod graph;

pub use graph::{Pipeline, PipelineBuilder, Port, ShutdownReport};

/// A wired tempo pipeline plus the handles a caller reads while it runs.
pub struct Assembly {
    pub pipeline: Pipeline,
    pub bpm: Arc<BpmReading>,
    pub recordings: Vec<(String, Arc<SinkStats>)>,
}

/// Wires ingestion -> band-pass -> energy -> onset -> peaks -> intervals ->
/// dominant interval -> BPM -> monitor, plus the recording taps requested in
/// `config.recording`. Sink files are opened here, before anything starts.
pub fn assemble(config: &Config, source: impl AudioSource + 'static) -> Result<Assembly> {
    let params = &config.pipeline;
    params.validate()?;

    let mut builder =
        PipelineBuilder::new(source).with_backlog_warning(params.backlog_warning);
    let mut taps = Taps::open(&config.recording, params.sample_rate)?;

    let raw = builder.source_port();
    taps.raw(&mut builder, &raw);

    let records = builder.add_stage(IngestStage::new(params.chunk_params()), &raw);
    let filtered = builder.add_stage(BandPassStage::new(params.band_pass_params()), &records);
    taps.record(&mut builder, &filtered, SignalTap::BandPass)?;
    let energy = builder.add_stage(EnergyStage, &filtered);
    taps.record(&mut builder, &energy, SignalTap::Energy)?;
    let onsets = builder.add_stage(OnsetStage::new(), &energy);
    taps.record(&mut builder, &onsets, SignalTap::OnsetStrength)?;
    let peaks = builder.add_stage(
        PeakPickerStage::new(params.window_seconds, params.peak_threshold),
        &onsets,
    );
    let intervals = builder.add_stage(InterOnsetIntervalStage, &peaks);
    let dominant = builder.add_stage(DominantIntervalStage, &intervals);
    let tempo = builder.add_stage(BpmStage::new(), &dominant);
    taps.record(&mut builder, &tempo, SignalTap::Bpm)?;

    let monitor = BpmMonitor::new();
    let bpm = monitor.reading();
    builder.add_stage(monitor, &tempo);

    Ok(Assembly {
        pipeline: builder.build(),
        bpm,
        recordings: taps.stats,
    })
}

struct Taps<'a> {
    dir: Option<&'a Path>,
    raw_bin: Option<BinFileSink<AudioChunk>>,
    wav: Option<WavFileSink>,
    stats: Vec<(String, Arc<SinkStats>)>,
}

impl<'a> Taps<'a> {
    fn open(recording: &'a RecordingConfig, sample_rate: u32) -> Result<Self> {
        let mut taps = Taps {
            dir: recording.dir.as_deref(),
            raw_bin: None,
            wav: None,
            stats: Vec::new(),
        };
        let Some(dir) = taps.dir else {
            return Ok(taps);
        };

        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create recording dir {}", dir.display()))?;
        taps.raw_bin = Some(BinFileSink::create(dir.join(SignalTap::Raw.file_name()))?);
        if recording.wav {
            taps.wav = Some(WavFileSink::create(dir.join("input.wav"), sample_rate)?);
        }
        log::info!("🎙️ Recording taps into {}", dir.display());
        Ok(taps)
    }

    fn raw(&mut self, builder: &mut PipelineBuilder, port: &Port<AudioChunk>) {
        if let Some(sink) = self.raw_bin.take() {
            self.stats.push((SignalTap::Raw.file_name().to_string(), sink.stats()));
            builder.add_stage(sink, port);
        }
        if let Some(sink) = self.wav.take() {
            self.stats.push(("input.wav".to_string(), sink.stats()));
            builder.add_stage(sink, port);
        }
    }

    fn record(
        &mut self,
        builder: &mut PipelineBuilder,
        port: &Port<PipelineResult>,
        tap: SignalTap,
    ) -> Result<()> {
        let Some(dir) = self.dir else {
            return Ok(());
        };
        let sink = BinFileSink::tap(dir.join(tap.file_name()), tap)?;
        self.stats.push((tap.file_name().to_string(), sink.stats()));
        builder.add_stage(sink, port);
        Ok(())
    }
}
