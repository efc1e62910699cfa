// src/dsp/stages/ingest.rs

use crate::dsp::result::{AudioChunk, ChunkParams, PipelineResult};
use crate::stream::Stage;

/// Wraps each raw chunk in a fresh record and stamps the pipeline parameters.
pub struct IngestStage {
    params: ChunkParams,
    next_index: u64,
}

impl IngestStage {
    pub fn new(params: ChunkParams) -> Self {
        log::info!(
            "IngestStage: {} Hz, {} samples/chunk, band-pass {}-{} Hz, gain {}",
            params.sample_rate,
            params.chunk_size,
            params.band_pass_low_cutoff,
            params.band_pass_high_cutoff,
            params.band_pass_gain
        );
        Self {
            params,
            next_index: 0,
        }
    }
}

impl Stage for IngestStage {
    type Input = AudioChunk;
    type Output = PipelineResult;

    fn name(&self) -> &str {
        "IngestStage"
    }

    fn transform(&mut self, chunk: AudioChunk) -> Option<PipelineResult> {
        let index = self.next_index;
        self.next_index += 1;
        if chunk.len() != self.params.chunk_size {
            log::trace!(
                "[IngestStage] chunk {} has {} samples (nominal {})",
                index,
                chunk.len(),
                self.params.chunk_size
            );
        }
        Some(PipelineResult::new(index, chunk, &self.params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_increasing_indices_and_copies_params() {
        let params = ChunkParams {
            sample_rate: 44100,
            chunk_size: 2,
            band_pass_low_cutoff: 80.0,
            band_pass_high_cutoff: 8000.0,
            band_pass_gain: 2.0,
        };
        let mut stage = IngestStage::new(params);

        let a = stage.transform(vec![0.1, 0.2]).unwrap();
        let b = stage.transform(vec![0.3, 0.4]).unwrap();

        assert_eq!(a.chunk_index, 0);
        assert_eq!(b.chunk_index, 1);
        assert_eq!(b.raw_audio, vec![0.3, 0.4]);
        assert_eq!(b.sample_rate, 44100);
        assert_eq!(b.band_pass_gain, 2.0);
        assert!(b.band_pass_filtered.is_none());
    }
}
