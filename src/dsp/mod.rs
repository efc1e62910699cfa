// src/dsp/mod.rs

pub mod filter;
pub mod result;
pub mod stages;

pub use filter::{BandPassFilter, BandPassParams};
pub use result::{AudioChunk, ChunkParams, PipelineResult};
