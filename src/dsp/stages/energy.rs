// src/dsp/stages/energy.rs

use crate::dsp::result::PipelineResult;
use crate::stream::Stage;

/// E = sum(s[n]^2), not normalised by length.
pub fn chunk_energy(samples: &[f32]) -> f32 {
    let mut energy = 0.0f32;
    for &s in samples {
        energy += s * s;
    }
    energy
}

pub struct EnergyStage;

impl Stage for EnergyStage {
    type Input = PipelineResult;
    type Output = PipelineResult;

    fn name(&self) -> &str {
        "EnergyStage"
    }

    fn transform(&mut self, mut record: PipelineResult) -> Option<PipelineResult> {
        match record.band_pass_filtered.as_deref() {
            Some(filtered) => record.energy = Some(chunk_energy(filtered)),
            None => log::debug!("[EnergyStage] chunk {} has no filtered audio", record.chunk_index),
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::result::ChunkParams;

    #[test]
    fn sums_squares() {
        assert_eq!(chunk_energy(&[1.0, -2.0, 0.5]), 5.25);
        assert_eq!(chunk_energy(&[]), 0.0);
    }

    #[test]
    fn fills_energy_from_filtered_audio() {
        let params = ChunkParams {
            sample_rate: 48000,
            chunk_size: 2,
            band_pass_low_cutoff: 100.0,
            band_pass_high_cutoff: 10000.0,
            band_pass_gain: 1.0,
        };
        let mut record = PipelineResult::new(0, vec![9.0, 9.0], &params);
        record.band_pass_filtered = Some(vec![3.0, 4.0]);

        let out = EnergyStage.transform(record).unwrap();
        assert_eq!(out.energy, Some(25.0));

        let untouched = EnergyStage
            .transform(PipelineResult::new(1, vec![1.0, 1.0], &params))
            .unwrap();
        assert_eq!(untouched.energy, None);
    }
}
