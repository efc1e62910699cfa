// src/sink/wav_file.rs

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};

use crate::dsp::result::AudioChunk;
use crate::sink::SinkStats;
use crate::stream::Stage;

/// Records the raw input as a mono 32-bit float WAV.
pub struct WavFileSink {
    path: PathBuf,
    writer: Option<WavWriter<BufWriter<File>>>,
    stats: Arc<SinkStats>,
}

impl WavFileSink {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref();
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create WAV file {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
            stats: Arc::new(SinkStats::default()),
        })
    }

    pub fn stats(&self) -> Arc<SinkStats> {
        self.stats.clone()
    }
}

impl Stage for WavFileSink {
    type Input = AudioChunk;
    type Output = ();

    fn name(&self) -> &str {
        "WavFileSink"
    }

    fn transform(&mut self, chunk: AudioChunk) -> Option<()> {
        let writer = self.writer.as_mut()?;
        let result = chunk.iter().try_for_each(|&s| writer.write_sample(s));
        match result {
            Ok(()) => self.stats.record_written(),
            Err(e) => {
                self.stats.record_failed();
                log::error!("[WavFileSink] write failed: {}", e);
            }
        }
        None
    }

    fn finish(&mut self) {
        let Some(writer) = self.writer.take() else {
            return;
        };
        match writer.finalize() {
            Ok(()) => log::info!(
                "💾 Recording saved to {} ({} chunks)",
                self.path.display(),
                self.stats.written()
            ),
            Err(e) => log::error!("[WavFileSink] finalize failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_readable_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.wav");
        let mut sink = WavFileSink::create(&path, 48000).unwrap();

        sink.transform(vec![0.0, 0.5, -0.5]);
        sink.transform(vec![1.0]);
        sink.finish();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 48000);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0.0, 0.5, -0.5, 1.0]);
    }
}
