// src/dsp/stages/intervals.rs

use crate::dsp::result::PipelineResult;
use crate::stream::Stage;

/// Consecutive differences between peak positions, in chunks.
pub fn inter_onset_intervals(peaks: &[usize]) -> Option<Vec<f32>> {
    if peaks.len() < 2 {
        return None;
    }
    Some(
        peaks
            .windows(2)
            .map(|w| w[1] as f32 - w[0] as f32)
            .collect(),
    )
}

/// Lower median: sort, then take index n/2.
pub fn dominant_interval(intervals: &[f32]) -> Option<f32> {
    if intervals.is_empty() {
        return None;
    }
    let mut sorted = intervals.to_vec();
    sorted.sort_by(f32::total_cmp);
    Some(sorted[sorted.len() / 2])
}

pub struct InterOnsetIntervalStage;

impl Stage for InterOnsetIntervalStage {
    type Input = PipelineResult;
    type Output = PipelineResult;

    fn name(&self) -> &str {
        "InterOnsetIntervalStage"
    }

    fn transform(&mut self, mut record: PipelineResult) -> Option<PipelineResult> {
        if let Some(peaks) = record.peak_indices.as_deref() {
            record.inter_onset_intervals = inter_onset_intervals(peaks);
        }
        Some(record)
    }
}

/// Picks the median interval as the window's periodicity.
pub struct DominantIntervalStage;

impl Stage for DominantIntervalStage {
    type Input = PipelineResult;
    type Output = PipelineResult;

    fn name(&self) -> &str {
        "DominantIntervalStage"
    }

    fn transform(&mut self, mut record: PipelineResult) -> Option<PipelineResult> {
        if let Some(intervals) = record.inter_onset_intervals.as_deref() {
            record.dominant_interval = dominant_interval(intervals);
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::result::ChunkParams;

    #[test]
    fn intervals_are_consecutive_deltas() {
        assert_eq!(inter_onset_intervals(&[3, 26, 49, 73]), Some(vec![23.0, 23.0, 24.0]));
        assert_eq!(inter_onset_intervals(&[5, 9]), Some(vec![4.0]));
        assert_eq!(inter_onset_intervals(&[5]), None);
    }

    #[test]
    fn dominant_is_lower_median() {
        assert_eq!(dominant_interval(&[4.0, 10.0, 6.0]), Some(6.0));
        // Even count takes index n/2 of the sorted list.
        assert_eq!(dominant_interval(&[8.0, 2.0, 6.0, 4.0]), Some(6.0));
        assert_eq!(dominant_interval(&[]), None);
    }

    #[test]
    fn stages_fill_fields_only_when_input_present() {
        let params = ChunkParams {
            sample_rate: 48000,
            chunk_size: 1024,
            band_pass_low_cutoff: 100.0,
            band_pass_high_cutoff: 10000.0,
            band_pass_gain: 1.0,
        };
        let mut record = PipelineResult::new(0, Vec::new(), &params);
        record.peak_indices = Some(vec![1, 5, 15, 21]);

        let record = InterOnsetIntervalStage.transform(record).unwrap();
        assert_eq!(record.inter_onset_intervals, Some(vec![4.0, 10.0, 6.0]));
        let record = DominantIntervalStage.transform(record).unwrap();
        assert_eq!(record.dominant_interval, Some(6.0));

        let empty = PipelineResult::new(1, Vec::new(), &params);
        let empty = InterOnsetIntervalStage.transform(empty).unwrap();
        let empty = DominantIntervalStage.transform(empty).unwrap();
        assert_eq!(empty.inter_onset_intervals, None);
        assert_eq!(empty.dominant_interval, None);
    }
}
