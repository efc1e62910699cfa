// src/lib.rs

pub mod cli;
pub mod config;
pub mod dsp;
pub mod error;
pub mod harness;
pub mod logging;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod stream;

pub use config::{Config, PipelineConfig, RecordingConfig};
pub use dsp::{AudioChunk, PipelineResult};
pub use error::PipelineError;
pub use pipeline::{Assembly, Pipeline, PipelineBuilder, ShutdownReport, assemble};
pub use stream::{Publisher, Stage, StageRunner, Subscriber};
