// src/dsp/stages/onset.rs

use crate::dsp::result::PipelineResult;
use crate::stream::Stage;

/// Onset strength: the positive part of the frame-to-frame energy change.
#[derive(Default)]
pub struct OnsetStage {
    previous_energy: f32,
}

impl OnsetStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, energy: f32) -> f32 {
        let strength = (energy - self.previous_energy).max(0.0);
        self.previous_energy = energy;
        strength
    }
}

impl Stage for OnsetStage {
    type Input = PipelineResult;
    type Output = PipelineResult;

    fn name(&self) -> &str {
        "OnsetStage"
    }

    fn transform(&mut self, mut record: PipelineResult) -> Option<PipelineResult> {
        if let Some(energy) = record.energy {
            record.onset_strength = Some(self.next(energy));
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_negative_and_tracks_previous_energy() {
        let energies = [0.0f32, 3.0, 1.0, 1.0, 7.5, 2.0, 2.5];
        let mut stage = OnsetStage::new();
        let mut prev = 0.0f32;
        for &e in &energies {
            let oss = stage.next(e);
            assert!(oss >= 0.0);
            assert_eq!(oss, (e - prev).max(0.0));
            prev = e;
        }
    }

    #[test]
    fn first_value_is_relative_to_zero() {
        let mut stage = OnsetStage::new();
        assert_eq!(stage.next(4.0), 4.0);
    }
}
