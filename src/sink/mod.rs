// src/sink/mod.rs

use std::sync::atomic::{AtomicU64, Ordering};

pub mod bin_file;
pub mod monitor;
pub mod wav_file;

pub use bin_file::{BinEncode, BinFileSink, SignalTap};
pub use monitor::{BpmMonitor, BpmReading};
pub use wav_file::WavFileSink;

/// Shared write counters, readable while the sink's worker owns the sink.
#[derive(Debug, Default)]
pub struct SinkStats {
    written: AtomicU64,
    failed: AtomicU64,
}

impl SinkStats {
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn failed_writes(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub(crate) fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }
}
