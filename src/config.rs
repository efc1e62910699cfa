// src/config.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::dsp::filter::BandPassParams;
use crate::dsp::result::ChunkParams;
use crate::dsp::stages::peaks::{DEFAULT_PEAK_THRESHOLD, DEFAULT_WINDOW_SECONDS};
use crate::error::PipelineError;

pub const DEFAULT_CONFIG_FILE: &str = "bpm_finder.toml";

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_low_cutoff")]
    pub band_pass_low_cutoff: f32,
    #[serde(default = "default_high_cutoff")]
    pub band_pass_high_cutoff: f32,
    #[serde(default = "default_gain")]
    pub band_pass_gain: f32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: f32,
    #[serde(default = "default_peak_threshold")]
    pub peak_threshold: f32,
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
    /// Queue depth at which a stage logs a backlog warning.
    #[serde(default = "default_backlog_warning")]
    pub backlog_warning: usize,
}

/// Optional taps. Nothing is recorded unless `dir` is set.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordingConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub wav: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            sample_rate: default_sample_rate(),
            band_pass_low_cutoff: default_low_cutoff(),
            band_pass_high_cutoff: default_high_cutoff(),
            band_pass_gain: default_gain(),
            window_seconds: default_window_seconds(),
            peak_threshold: default_peak_threshold(),
            drain_timeout_ms: default_drain_timeout_ms(),
            backlog_warning: default_backlog_warning(),
        }
    }
}

fn default_chunk_size() -> usize {
    1024
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_low_cutoff() -> f32 {
    100.0
}

fn default_high_cutoff() -> f32 {
    10000.0
}

fn default_gain() -> f32 {
    1.0
}

fn default_window_seconds() -> f32 {
    DEFAULT_WINDOW_SECONDS
}

fn default_peak_threshold() -> f32 {
    DEFAULT_PEAK_THRESHOLD
}

fn default_drain_timeout_ms() -> u64 {
    5000
}

fn default_backlog_warning() -> usize {
    256
}

impl PipelineConfig {
    /// Rejects values no stage can work with. Band-pass degeneracy is not an
    /// error here: the filter stage handles it by leaving its output empty.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.chunk_size == 0 {
            return Err(PipelineError::InvalidConfig("chunk_size must be > 0".into()));
        }
        if self.sample_rate == 0 {
            return Err(PipelineError::InvalidConfig("sample_rate must be > 0".into()));
        }
        if !(self.window_seconds > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "window_seconds must be > 0 (got {})",
                self.window_seconds
            )));
        }
        if !self.peak_threshold.is_finite() {
            return Err(PipelineError::InvalidConfig("peak_threshold must be finite".into()));
        }
        Ok(())
    }

    pub fn chunk_params(&self) -> ChunkParams {
        ChunkParams {
            sample_rate: self.sample_rate,
            chunk_size: self.chunk_size,
            band_pass_low_cutoff: self.band_pass_low_cutoff,
            band_pass_high_cutoff: self.band_pass_high_cutoff,
            band_pass_gain: self.band_pass_gain,
        }
    }

    pub fn band_pass_params(&self) -> BandPassParams {
        BandPassParams {
            low_cutoff: self.band_pass_low_cutoff,
            high_cutoff: self.band_pass_high_cutoff,
            sample_rate: self.sample_rate as f32,
            gain: self.band_pass_gain,
        }
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
}

/// Loads `explicit` if given, otherwise `bpm_finder.toml` when it exists,
/// otherwise the defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        let config = load_config(path)?;
        log::info!("Loaded config from {}", path.display());
        return Ok(config);
    }
    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        let config = load_config(default_path)?;
        log::info!("Loaded config from {}", default_path.display());
        return Ok(config);
    }
    Ok(Config::default())
}
