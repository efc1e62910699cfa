// src/sink/bin_file.rs

use std::fs::File;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::dsp::result::{AudioChunk, PipelineResult};
use crate::sink::SinkStats;
use crate::stream::Stage;

/// Values a raw f32 dump can write. `None` writes nothing for that item.
pub trait BinEncode: Send + 'static {
    fn samples(&self) -> Option<&[f32]>;
}

impl BinEncode for AudioChunk {
    fn samples(&self) -> Option<&[f32]> {
        Some(self.as_slice())
    }
}

impl BinEncode for f32 {
    fn samples(&self) -> Option<&[f32]> {
        Some(std::slice::from_ref(self))
    }
}

/// Which signal of a record a tap dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalTap {
    Raw,
    BandPass,
    Energy,
    OnsetStrength,
    Bpm,
}

impl SignalTap {
    pub fn file_name(self) -> &'static str {
        match self {
            SignalTap::Raw => "raw.bin",
            SignalTap::BandPass => "bandpass.bin",
            SignalTap::Energy => "energy.bin",
            SignalTap::OnsetStrength => "onset.bin",
            SignalTap::Bpm => "bpm.bin",
        }
    }

    fn projection(self) -> fn(&PipelineResult) -> Option<&[f32]> {
        match self {
            SignalTap::Raw => raw_audio,
            SignalTap::BandPass => band_pass_filtered,
            SignalTap::Energy => energy,
            SignalTap::OnsetStrength => onset_strength,
            SignalTap::Bpm => bpm,
        }
    }
}

fn raw_audio(r: &PipelineResult) -> Option<&[f32]> {
    Some(r.raw_audio.as_slice())
}

fn band_pass_filtered(r: &PipelineResult) -> Option<&[f32]> {
    r.band_pass_filtered.as_deref()
}

fn energy(r: &PipelineResult) -> Option<&[f32]> {
    r.energy.as_ref().map(std::slice::from_ref)
}

fn onset_strength(r: &PipelineResult) -> Option<&[f32]> {
    r.onset_strength.as_ref().map(std::slice::from_ref)
}

fn bpm(r: &PipelineResult) -> Option<&[f32]> {
    r.bpm.as_ref().map(std::slice::from_ref)
}

/// Terminal stage writing little-endian f32 values back to back, no header.
pub struct BinFileSink<T> {
    name: String,
    path: PathBuf,
    writer: BufWriter<File>,
    project: fn(&T) -> Option<&[f32]>,
    stats: Arc<SinkStats>,
    _item: PhantomData<fn(T)>,
}

impl<T: BinEncode> BinFileSink<T> {
    /// Truncates or creates `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path.as_ref(), T::samples)
    }
}

impl BinFileSink<PipelineResult> {
    pub fn tap(path: impl AsRef<Path>, tap: SignalTap) -> Result<Self> {
        Self::open(path.as_ref(), tap.projection())
    }
}

impl<T> BinFileSink<T> {
    fn open(path: &Path, project: fn(&T) -> Option<&[f32]>) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name: format!("BinFileSink({file_name})"),
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            project,
            stats: Arc::new(SinkStats::default()),
            _item: PhantomData,
        })
    }

    pub fn stats(&self) -> Arc<SinkStats> {
        self.stats.clone()
    }

    fn write_values(&mut self, values: &[f32]) -> std::io::Result<()> {
        for v in values {
            self.writer.write_all(&v.to_le_bytes())?;
        }
        Ok(())
    }
}

impl<T: Send + 'static> Stage for BinFileSink<T> {
    type Input = T;
    type Output = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&mut self, item: T) -> Option<()> {
        let project = self.project;
        let values = project(&item)?;
        match self.write_values(values) {
            Ok(()) => self.stats.record_written(),
            Err(e) => {
                self.stats.record_failed();
                log::error!("[{}] write failed: {}", self.name, e);
            }
        }
        None
    }

    fn finish(&mut self) {
        if let Err(e) = self.writer.flush() {
            log::error!("[{}] flush failed: {}", self.name, e);
            return;
        }
        log::info!(
            "💾 {} items written to {}",
            self.stats.written(),
            self.path.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::result::ChunkParams;

    fn read_f32s(path: &Path) -> Vec<f32> {
        std::fs::read(path)
            .unwrap()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    #[test]
    fn energy_tap_skips_records_without_energy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SignalTap::Energy.file_name());
        let mut sink = BinFileSink::tap(&path, SignalTap::Energy).unwrap();

        let params = ChunkParams {
            sample_rate: 48000,
            chunk_size: 2,
            band_pass_low_cutoff: 100.0,
            band_pass_high_cutoff: 10000.0,
            band_pass_gain: 1.0,
        };
        let mut with = PipelineResult::new(0, vec![0.0, 0.0], &params);
        with.energy = Some(1.25);
        let without = PipelineResult::new(1, vec![0.0, 0.0], &params);

        sink.transform(with);
        sink.transform(without);
        sink.finish();

        assert_eq!(read_f32s(&path), vec![1.25]);
        assert_eq!(sink.stats().written(), 1);
        assert_eq!(sink.stats().failed_writes(), 0);
    }

    #[test]
    fn unwritable_path_fails_at_construction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("raw.bin");
        assert!(BinFileSink::<AudioChunk>::create(&path).is_err());
    }
}
