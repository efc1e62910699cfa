// src/source/replay.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::dsp::result::AudioChunk;
use crate::error::PipelineError;
use crate::source::AudioSource;
use crate::stream::Publisher;

/// Publishes an in-memory signal as consecutive chunks, then finishes.
pub struct ReplaySource {
    name: String,
    samples: Arc<Vec<f32>>,
    chunk_size: usize,
    pacing: Option<Duration>,
    publisher: Arc<Publisher<AudioChunk>>,
    stop: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ReplaySource {
    pub fn new(samples: Vec<f32>, chunk_size: usize) -> Self {
        Self {
            name: "ReplaySource".to_string(),
            samples: Arc::new(samples),
            chunk_size,
            pacing: None,
            publisher: Arc::new(Publisher::new()),
            stop: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sleep one chunk duration between publishes, like a live device would.
    pub fn with_realtime_pacing(mut self, sample_rate: u32) -> Self {
        if sample_rate > 0 {
            self.pacing = Some(Duration::from_secs_f64(
                self.chunk_size as f64 / sample_rate as f64,
            ));
        }
        self
    }

    pub(crate) fn set_samples(&mut self, samples: Vec<f32>) {
        self.samples = Arc::new(samples);
    }

    /// Number of chunks a full replay publishes, counting the partial tail.
    pub fn chunk_count(&self) -> usize {
        if self.chunk_size == 0 {
            return 0;
        }
        self.samples.len().div_ceil(self.chunk_size)
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("[{}] replay thread panicked", self.name);
            }
        }
    }
}

impl AudioSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    /// Rewinds to the first sample.
    fn initialize(&mut self) -> Result<(), PipelineError> {
        if self.chunk_size == 0 {
            return Err(PipelineError::SourceInit {
                source_name: self.name.clone(),
                reason: "chunk size must be non-zero".to_string(),
            });
        }
        self.stop.store(true, Ordering::SeqCst);
        self.join_worker();
        self.stop.store(false, Ordering::SeqCst);
        self.finished.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        if self.worker.is_some() {
            return Err(PipelineError::AlreadyStarted(self.name.clone()));
        }

        let samples = self.samples.clone();
        let chunk_size = self.chunk_size;
        let pacing = self.pacing;
        let publisher = self.publisher.clone();
        let stop = self.stop.clone();
        let finished = self.finished.clone();
        let name = self.name.clone();
        let total = self.chunk_count();

        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let mut published = 0usize;
                for chunk in samples.chunks(chunk_size) {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    publisher.publish(chunk.to_vec());
                    published += 1;
                    if let Some(pause) = pacing {
                        thread::sleep(pause);
                    }
                }
                log::info!(
                    "[{}] replay finished after {} of {} chunks",
                    name,
                    published,
                    total
                );
                finished.store(true, Ordering::SeqCst);
            })
            .map_err(|source| PipelineError::Spawn {
                name: self.name.clone(),
                source,
            })?;

        self.worker = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.join_worker();
        self.finished.store(true, Ordering::SeqCst);
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    fn publisher(&self) -> Arc<Publisher<AudioChunk>> {
        self.publisher.clone()
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Subscriber;
    use crate::stream::wait_until;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Chunks(Mutex<Vec<AudioChunk>>);

    impl Subscriber<AudioChunk> for Chunks {
        fn push(&self, item: AudioChunk) {
            self.0.lock().unwrap().push(item);
        }
    }

    #[test]
    fn publishes_partial_tail_then_finishes() {
        let mut source = ReplaySource::new((0..10).map(|i| i as f32).collect(), 4);
        let sink = Arc::new(Chunks::default());
        source.publisher().subscribe(sink.clone());
        assert_eq!(source.chunk_count(), 3);

        source.initialize().unwrap();
        source.start().unwrap();
        assert!(wait_until(
            Duration::from_secs(5),
            Duration::from_millis(1),
            || source.is_finished()
        ));
        source.stop();

        let chunks = sink.0.lock().unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(chunks[2], vec![8.0, 9.0]);
    }

    #[test]
    fn initialize_rewinds() {
        let mut source = ReplaySource::new(vec![1.0; 8], 4);
        let sink = Arc::new(Chunks::default());
        source.publisher().subscribe(sink.clone());

        for _ in 0..2 {
            source.initialize().unwrap();
            source.start().unwrap();
            assert!(wait_until(
                Duration::from_secs(5),
                Duration::from_millis(1),
                || source.is_finished()
            ));
        }
        source.stop();
        assert_eq!(sink.0.lock().unwrap().len(), 4);
    }

    #[test]
    fn zero_chunk_size_fails_initialization() {
        let mut source = ReplaySource::new(vec![1.0], 0);
        assert!(matches!(
            source.initialize(),
            Err(PipelineError::SourceInit { .. })
        ));
    }
}
