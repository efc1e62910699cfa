// src/sink/monitor.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::dsp::result::PipelineResult;
use crate::stream::Stage;

/// Latest tempo, shared lock-free with whoever displays it.
#[derive(Debug, Default)]
pub struct BpmReading {
    bits: AtomicU32,
    updates: AtomicU64,
}

impl BpmReading {
    pub fn latest(&self) -> Option<f32> {
        if self.updates() == 0 {
            return None;
        }
        Some(f32::from_bits(self.bits.load(Ordering::Acquire)))
    }

    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Acquire)
    }

    fn store(&self, bpm: f32) {
        self.bits.store(bpm.to_bits(), Ordering::Release);
        self.updates.fetch_add(1, Ordering::AcqRel);
    }
}

/// Terminal stage at the end of the tempo chain.
pub struct BpmMonitor {
    reading: Arc<BpmReading>,
}

impl BpmMonitor {
    pub fn new() -> Self {
        Self {
            reading: Arc::new(BpmReading::default()),
        }
    }

    pub fn reading(&self) -> Arc<BpmReading> {
        self.reading.clone()
    }
}

impl Default for BpmMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for BpmMonitor {
    type Input = PipelineResult;
    type Output = ();

    fn name(&self) -> &str {
        "BpmMonitor"
    }

    fn transform(&mut self, record: PipelineResult) -> Option<()> {
        let bpm = record.bpm?;
        log::info!("🎵 BPM: {:.1}", bpm);
        self.reading.store(bpm);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::result::ChunkParams;

    #[test]
    fn keeps_latest_value() {
        let params = ChunkParams {
            sample_rate: 48000,
            chunk_size: 1024,
            band_pass_low_cutoff: 100.0,
            band_pass_high_cutoff: 10000.0,
            band_pass_gain: 1.0,
        };
        let mut monitor = BpmMonitor::new();
        let reading = monitor.reading();
        assert_eq!(reading.latest(), None);

        let mut r = PipelineResult::new(0, Vec::new(), &params);
        r.bpm = Some(120.0);
        monitor.transform(r.clone());
        r.bpm = Some(98.5);
        monitor.transform(r.clone());
        r.bpm = None;
        monitor.transform(r);

        assert_eq!(reading.latest(), Some(98.5));
        assert_eq!(reading.updates(), 2);
    }
}
