// src/dsp/stages/peaks.rs

use std::collections::VecDeque;

use crate::dsp::result::{PipelineResult, chunks_per_second};
use crate::stream::Stage;

pub const DEFAULT_WINDOW_SECONDS: f32 = 15.0;
pub const DEFAULT_PEAK_THRESHOLD: f32 = 0.6;

/// Number of onset values (one per chunk) covering `window_seconds`.
pub fn window_len(sample_rate: u32, chunk_size: usize, window_seconds: f32) -> usize {
    chunks_per_second(sample_rate, chunk_size)
        .map_or(0, |rate| (rate * window_seconds).round().max(0.0) as usize)
}

/// Interior local maxima above `max * threshold_ratio`.
pub fn find_peaks(buf: &[f32], threshold_ratio: f32) -> Vec<usize> {
    if buf.len() < 3 {
        return Vec::new();
    }
    let max = buf.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let threshold = max * threshold_ratio;

    (1..buf.len() - 1)
        .filter(|&i| buf[i] > threshold && buf[i] > buf[i - 1] && buf[i] > buf[i + 1])
        .collect()
}

/// Sliding-window peak picker over the onset-strength signal.
///
/// Silent until the window is full; afterwards every record carries the
/// peaks of the current window, if there are at least two.
pub struct PeakPickerStage {
    window_seconds: f32,
    threshold_ratio: f32,
    history: VecDeque<f32>,
    capacity: usize,
}

impl PeakPickerStage {
    pub fn new(window_seconds: f32, threshold_ratio: f32) -> Self {
        log::info!(
            "PeakPickerStage: window {}s, threshold ratio {}",
            window_seconds,
            threshold_ratio
        );
        Self {
            window_seconds,
            threshold_ratio,
            history: VecDeque::new(),
            capacity: 0,
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Appends one onset value and returns the window's peaks once it is full.
    pub fn push(&mut self, onset: f32, capacity: usize) -> Option<Vec<usize>> {
        if capacity != self.capacity {
            log::debug!("[PeakPickerStage] window resized {} -> {}", self.capacity, capacity);
            self.capacity = capacity;
        }

        self.history.push_back(onset);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }

        if self.capacity == 0 || self.history.len() < self.capacity {
            return None;
        }

        let peaks = find_peaks(self.history.make_contiguous(), self.threshold_ratio);
        (peaks.len() >= 2).then_some(peaks)
    }
}

impl Default for PeakPickerStage {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SECONDS, DEFAULT_PEAK_THRESHOLD)
    }
}

impl Stage for PeakPickerStage {
    type Input = PipelineResult;
    type Output = PipelineResult;

    fn name(&self) -> &str {
        "PeakPickerStage"
    }

    fn transform(&mut self, mut record: PipelineResult) -> Option<PipelineResult> {
        let Some(onset) = record.onset_strength else {
            return Some(record);
        };
        let capacity = window_len(record.sample_rate, record.chunk_size, self.window_seconds);
        record.peak_indices = self.push(onset, capacity);
        if let Some(peaks) = &record.peak_indices {
            log::trace!("[PeakPickerStage] chunk {}: {} peaks", record.chunk_index, peaks.len());
        }
        Some(record)
    }
}
