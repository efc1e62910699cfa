// src/dsp/result.rs

use serde::{Deserialize, Serialize};

/// One block of mono samples, as captured.
pub type AudioChunk = Vec<f32>;

/// Per-chunk record threaded through the onset-detection chain.
///
/// Each stage fills only its own field. `None` means "not available yet",
/// never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub chunk_index: u64,

    // Processing parameters, copied at ingestion.
    pub sample_rate: u32,
    pub chunk_size: usize,
    pub band_pass_low_cutoff: f32,
    pub band_pass_high_cutoff: f32,
    pub band_pass_gain: f32,

    // 1:1 with the chunk.
    pub raw_audio: AudioChunk,
    #[serde(default)]
    pub band_pass_filtered: Option<AudioChunk>,
    #[serde(default)]
    pub energy: Option<f32>,
    #[serde(default)]
    pub onset_strength: Option<f32>,

    // Aggregates, only present once enough history has accumulated.
    #[serde(default)]
    pub peak_indices: Option<Vec<usize>>,
    #[serde(default)]
    pub inter_onset_intervals: Option<Vec<f32>>,
    #[serde(default)]
    pub dominant_interval: Option<f32>,
    #[serde(default)]
    pub bpm: Option<f32>,
}

impl PipelineResult {
    pub fn new(chunk_index: u64, raw_audio: AudioChunk, params: &ChunkParams) -> Self {
        Self {
            chunk_index,
            sample_rate: params.sample_rate,
            chunk_size: params.chunk_size,
            band_pass_low_cutoff: params.band_pass_low_cutoff,
            band_pass_high_cutoff: params.band_pass_high_cutoff,
            band_pass_gain: params.band_pass_gain,
            raw_audio,
            band_pass_filtered: None,
            energy: None,
            onset_strength: None,
            peak_indices: None,
            inter_onset_intervals: None,
            dominant_interval: None,
            bpm: None,
        }
    }
}

/// Chunks per second; `None` when the parameters can't describe a time base.
pub fn chunks_per_second(sample_rate: u32, chunk_size: usize) -> Option<f32> {
    if sample_rate == 0 || chunk_size == 0 {
        return None;
    }
    Some(sample_rate as f32 / chunk_size as f32)
}

/// Parameters stamped onto every record at ingestion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkParams {
    pub sample_rate: u32,
    pub chunk_size: usize,
    pub band_pass_low_cutoff: f32,
    pub band_pass_high_cutoff: f32,
    pub band_pass_gain: f32,
}
