// src/dsp/stages/bpm.rs

use crate::dsp::result::{PipelineResult, chunks_per_second};
use crate::stream::Stage;

pub const MIN_BPM: f32 = 30.0;
pub const MAX_BPM: f32 = 240.0;

/// Converts a dominant interval in chunks into beats per minute, clamped to
/// [MIN_BPM, MAX_BPM]. `None` if the interval maps to no positive duration.
pub fn interval_to_bpm(dominant_interval: f32, sample_rate: u32, chunk_size: usize) -> Option<f32> {
    let interval_seconds = dominant_interval / chunks_per_second(sample_rate, chunk_size)?;
    if !(interval_seconds > 0.0) || !interval_seconds.is_finite() {
        return None;
    }
    Some((60.0 / interval_seconds).clamp(MIN_BPM, MAX_BPM))
}

/// Emits a record only when the tempo changes (bit-exact comparison).
#[derive(Default)]
pub struct BpmStage {
    current_bpm: Option<f32>,
    suppressed: u64,
}

impl BpmStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_bpm(&self) -> Option<f32> {
        self.current_bpm
    }

    /// How many computed values were identical to the last emitted one.
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}

impl Stage for BpmStage {
    type Input = PipelineResult;
    type Output = PipelineResult;

    fn name(&self) -> &str {
        "BpmStage"
    }

    fn transform(&mut self, mut record: PipelineResult) -> Option<PipelineResult> {
        let interval = record.dominant_interval?;
        let bpm = interval_to_bpm(interval, record.sample_rate, record.chunk_size)?;

        let previous = self.current_bpm.replace(bpm);
        if previous.is_some_and(|p| p.to_bits() == bpm.to_bits()) {
            self.suppressed += 1;
            return None;
        }

        log::debug!("[BpmStage] chunk {}: {:.1} BPM", record.chunk_index, bpm);
        record.bpm = Some(bpm);
        Some(record)
    }
}
