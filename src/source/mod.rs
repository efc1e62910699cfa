// src/source/mod.rs

use std::sync::Arc;

use crate::dsp::result::AudioChunk;
use crate::error::PipelineError;
use crate::stream::Publisher;

pub mod capture;
pub mod file;
pub mod replay;

pub use capture::CaptureSource;
pub use file::FileAudioSource;
pub use replay::ReplaySource;

/// Head of a pipeline: produces fixed-size mono chunks on its own thread.
///
/// The pipeline subscribes to `publisher()` while building, calls
/// `initialize()` and `start()` only after every stage is running, and
/// calls `stop()` first during shutdown.
pub trait AudioSource {
    fn name(&self) -> &str;
    fn initialize(&mut self) -> Result<(), PipelineError>;
    fn start(&mut self) -> Result<(), PipelineError>;
    /// Stops producing and joins the producer thread. Idempotent.
    fn stop(&mut self);
    /// True once the source will never publish again.
    fn is_finished(&self) -> bool;
    fn publisher(&self) -> Arc<Publisher<AudioChunk>>;
}
