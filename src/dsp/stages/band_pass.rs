// src/dsp/stages/band_pass.rs

use crate::dsp::filter::{BandPassFilter, BandPassParams};
use crate::dsp::result::PipelineResult;
use crate::stream::Stage;

/// Filters `raw_audio` into `band_pass_filtered`, taking cutoffs and gain
/// from each record so they may change chunk to chunk.
pub struct BandPassStage {
    filter: BandPassFilter,
}

impl BandPassStage {
    pub fn new(params: BandPassParams) -> Self {
        log::info!(
            "BandPassStage: {}-{} Hz @ {} Hz, gain {}",
            params.low_cutoff,
            params.high_cutoff,
            params.sample_rate,
            params.gain
        );
        Self {
            filter: BandPassFilter::new(params),
        }
    }
}

impl Stage for BandPassStage {
    type Input = PipelineResult;
    type Output = PipelineResult;

    fn name(&self) -> &str {
        "BandPassStage"
    }

    fn transform(&mut self, mut record: PipelineResult) -> Option<PipelineResult> {
        self.filter.update_parameters(BandPassParams {
            low_cutoff: record.band_pass_low_cutoff,
            high_cutoff: record.band_pass_high_cutoff,
            sample_rate: record.sample_rate as f32,
            gain: record.band_pass_gain,
        });

        if self.filter.is_usable() {
            record.band_pass_filtered = Some(self.filter.process_chunk(&record.raw_audio));
        } else {
            log::debug!(
                "[BandPassStage] chunk {}: degenerate band, not filtered",
                record.chunk_index
            );
        }
        Some(record)
    }
}
