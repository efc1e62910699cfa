// src/source/file.rs

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    calculate_cutoff,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use crate::dsp::result::AudioChunk;
use crate::error::PipelineError;
use crate::source::{AudioSource, ReplaySource};
use crate::stream::Publisher;

/// Replays a recording through the pipeline.
///
/// `.bin` files are raw little-endian f32, `.txt` files hold whitespace
/// separated floats, anything else goes through symphonia and is downmixed
/// to mono and resampled to the pipeline rate.
pub struct FileAudioSource {
    path: PathBuf,
    sample_rate: u32,
    replay: ReplaySource,
    loaded: bool,
}

impl FileAudioSource {
    pub fn new(path: impl Into<PathBuf>, sample_rate: u32, chunk_size: usize) -> Self {
        let path = path.into();
        let replay = ReplaySource::new(Vec::new(), chunk_size)
            .with_name(format!("FileAudioSource({})", path.display()));
        Self {
            path,
            sample_rate,
            replay,
            loaded: false,
        }
    }

    pub fn with_realtime_pacing(mut self) -> Self {
        self.replay = self.replay.with_realtime_pacing(self.sample_rate);
        self
    }
}

impl AudioSource for FileAudioSource {
    fn name(&self) -> &str {
        self.replay.name()
    }

    /// Loads the file the first time; later calls only rewind.
    fn initialize(&mut self) -> Result<(), PipelineError> {
        if !self.loaded {
            let samples =
                load_samples(&self.path, self.sample_rate).map_err(|e| PipelineError::SourceInit {
                    source_name: self.replay.name().to_string(),
                    reason: format!("{e:#}"),
                })?;
            log::info!(
                "📂 Loaded {} samples ({:.1} s) from {}",
                samples.len(),
                samples.len() as f64 / self.sample_rate.max(1) as f64,
                self.path.display()
            );
            self.replay.set_samples(samples);
            self.loaded = true;
        }
        self.replay.initialize()
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        self.replay.start()
    }

    fn stop(&mut self) {
        self.replay.stop();
    }

    fn is_finished(&self) -> bool {
        self.replay.is_finished()
    }

    fn publisher(&self) -> Arc<Publisher<AudioChunk>> {
        self.replay.publisher()
    }
}

fn load_samples(path: &Path, sample_rate: u32) -> Result<Vec<f32>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let samples = match extension.as_deref() {
        Some("bin") => read_f32_le(path)?,
        Some("txt") => read_text(path)?,
        _ => {
            let (decoded, file_rate) = decode_mono(path)?;
            resample(decoded, file_rate, sample_rate)?
        }
    };

    if samples.is_empty() {
        bail!("{} contains no samples", path.display());
    }
    Ok(samples)
}

fn read_f32_le(path: &Path) -> Result<Vec<f32>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let chunks = bytes.chunks_exact(4);
    if !chunks.remainder().is_empty() {
        log::warn!(
            "{}: ignoring {} trailing bytes",
            path.display(),
            chunks.remainder().len()
        );
    }
    Ok(chunks
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn read_text(path: &Path) -> Result<Vec<f32>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    text.split_whitespace()
        .enumerate()
        .map(|(i, token)| {
            token.parse::<f32>().with_context(|| {
                format!(
                    "{}: value {} ('{}') is not a number",
                    path.display(),
                    i,
                    token
                )
            })
        })
        .collect()
}

/// Decodes the default track and averages its channels.
fn decode_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("Unsupported audio file {}", path.display()))?;
    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("no default audio track"))?;
    let track_id = track.id;
    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut out = Vec::new();

    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                log::debug!("skipping undecodable packet: {}", e);
                continue;
            }
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        sample_rate.get_or_insert(spec.rate);

        if sample_buf
            .as_ref()
            .is_none_or(|buf| buf.capacity() < decoded.capacity())
        {
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        out.extend(
            buf.samples()
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
        );
    }

    let sample_rate = sample_rate.ok_or_else(|| anyhow!("unknown sample rate"))?;
    log::debug!("Decoded {} mono frames @ {} Hz", out.len(), sample_rate);
    Ok((out, sample_rate))
}

fn build_resampler(src_rate: u32, dst_rate: u32) -> Result<Option<SincFixedIn<f32>>> {
    if src_rate == dst_rate {
        return Ok(None);
    }
    let sinc_len = 256;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window,
    };
    let ratio = dst_rate as f64 / src_rate as f64;
    Ok(Some(SincFixedIn::<f32>::new(ratio, 2.0, params, 1024, 1)?))
}

fn resample(samples: Vec<f32>, src_rate: u32, dst_rate: u32) -> Result<Vec<f32>> {
    let Some(mut resampler) = build_resampler(src_rate, dst_rate)? else {
        return Ok(samples);
    };
    log::info!("🔄 Resampling {} Hz -> {} Hz", src_rate, dst_rate);

    let mut out = Vec::with_capacity(
        (samples.len() as f64 * dst_rate as f64 / src_rate as f64) as usize + 1024,
    );
    let mut pos = 0;
    loop {
        let need = resampler.input_frames_next();
        if samples.len() - pos < need {
            break;
        }
        let block = [&samples[pos..pos + need]];
        let processed = resampler.process(&block[..], None)?;
        out.extend_from_slice(&processed[0]);
        pos += need;
    }
    if pos < samples.len() {
        let block = [&samples[pos..]];
        let processed = resampler.process_partial(Some(&block[..]), None)?;
        out.extend_from_slice(&processed[0]);
    }
    let tail = resampler.process_partial::<Vec<f32>>(None, None)?;
    out.extend_from_slice(&tail[0]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_little_endian_f32() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.bin");
        let mut file = File::create(&path).unwrap();
        for v in [0.25f32, -1.0, 3.5] {
            file.write_all(&v.to_le_bytes()).unwrap();
        }
        drop(file);

        assert_eq!(load_samples(&path, 48000).unwrap(), vec![0.25, -1.0, 3.5]);
    }

    #[test]
    fn reads_whitespace_separated_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.txt");
        std::fs::write(&path, "0.5 1.0\n-0.5\t2\n").unwrap();
        assert_eq!(load_samples(&path, 48000).unwrap(), vec![0.5, 1.0, -0.5, 2.0]);
    }

    #[test]
    fn text_reports_position_of_bad_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.txt");
        std::fs::write(&path, "0.5 oops 1.0\n").unwrap();
        let err = format!("{:#}", load_samples(&path, 48000).unwrap_err());
        assert!(err.contains("value 1 ('oops') is not a number"), "{err}");
    }

    #[test]
    fn decodes_wav_and_downmixes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(0.5f32).unwrap();
            writer.write_sample(-0.25f32).unwrap();
        }
        writer.finalize().unwrap();

        let samples = load_samples(&path, 48000).unwrap();
        assert_eq!(samples.len(), 100);
        assert!(samples.iter().all(|&s| (s - 0.125).abs() < 1e-6));
    }

    #[test]
    fn empty_or_missing_file_fails_initialization() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.bin");
        File::create(&empty).unwrap();

        let mut source = FileAudioSource::new(&empty, 48000, 1024);
        assert!(matches!(
            source.initialize(),
            Err(PipelineError::SourceInit { .. })
        ));

        let mut missing = FileAudioSource::new(dir.path().join("nope.bin"), 48000, 1024);
        assert!(missing.initialize().is_err());
    }
}
