// src/cli.rs

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "bpm_finder", about = "Streaming tempo estimation from live or recorded audio")]
pub struct Cli {
    /// Replay this file instead of capturing (.bin raw f32, .txt, WAV/MP3/FLAC/OGG)
    pub input: Option<PathBuf>,

    /// TOML config file (default: ./bpm_finder.toml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Samples per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Pipeline sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Band-pass lower cutoff in Hz
    #[arg(long)]
    pub low_cutoff: Option<f32>,

    /// Band-pass upper cutoff in Hz
    #[arg(long)]
    pub high_cutoff: Option<f32>,

    /// Band-pass gain
    #[arg(long)]
    pub gain: Option<f32>,

    /// Onset history used for peak picking, in seconds
    #[arg(long)]
    pub window: Option<f32>,

    /// Peak threshold as a fraction of the window maximum
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Write raw/bandpass/energy/onset dumps into this directory
    #[arg(short, long)]
    pub record_dir: Option<PathBuf>,

    /// Also write the raw input as input.wav into the record directory
    #[arg(long)]
    pub wav: bool,

    /// Stop after this many seconds
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Replay files at real-time speed
    #[arg(long)]
    pub realtime: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Command-line values win over the config file.
    pub fn apply_overrides(&self, config: &mut Config) {
        let p = &mut config.pipeline;
        if let Some(v) = self.chunk_size {
            p.chunk_size = v;
        }
        if let Some(v) = self.sample_rate {
            p.sample_rate = v;
        }
        if let Some(v) = self.low_cutoff {
            p.band_pass_low_cutoff = v;
        }
        if let Some(v) = self.high_cutoff {
            p.band_pass_high_cutoff = v;
        }
        if let Some(v) = self.gain {
            p.band_pass_gain = v;
        }
        if let Some(v) = self.window {
            p.window_seconds = v;
        }
        if let Some(v) = self.threshold {
            p.peak_threshold = v;
        }
        if let Some(dir) = &self.record_dir {
            config.recording.dir = Some(dir.clone());
        }
        if self.wav {
            config.recording.wav = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let cli = Cli::parse_from(["bpm_finder", "--chunk-size", "512", "--wav", "-r", "dump"]);
        let text = "[pipeline]\nchunk_size = 2048\nsample_rate = 44100\n";
        let mut config: Config = toml::from_str(text).unwrap();
        cli.apply_overrides(&mut config);

        assert_eq!(config.pipeline.chunk_size, 512);
        assert_eq!(config.pipeline.sample_rate, 44100);
        assert_eq!(config.recording.dir, Some(PathBuf::from("dump")));
        assert!(config.recording.wav);
    }
}
