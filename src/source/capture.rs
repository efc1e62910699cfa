// src/source/capture.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::dsp::result::AudioChunk;
use crate::error::PipelineError;
use crate::source::AudioSource;
use crate::stream::Publisher;

const RING_SECONDS: usize = 2;
const READER_IDLE: Duration = Duration::from_millis(2);

/// Live input from the default capture device.
///
/// The device callback only downmixes and pushes into a ring buffer; a reader
/// thread cuts the ring buffer into chunks and publishes them.
pub struct CaptureSource {
    sample_rate: u32,
    chunk_size: usize,
    publisher: Arc<Publisher<AudioChunk>>,
    stream: Option<Stream>,
    consumer: Option<HeapCons<f32>>,
    device_name: String,
    overflow: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl CaptureSource {
    pub fn new(sample_rate: u32, chunk_size: usize) -> Self {
        Self {
            sample_rate,
            chunk_size,
            publisher: Arc::new(Publisher::new()),
            stream: None,
            consumer: None,
            device_name: String::new(),
            overflow: Arc::new(AtomicU64::new(0)),
            stop: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
            reader: None,
        }
    }

    /// Samples dropped because the reader fell behind the device.
    pub fn overflowed_samples(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }

    fn init_error(&self, reason: impl ToString) -> PipelineError {
        PipelineError::SourceInit {
            source_name: "CaptureSource".to_string(),
            reason: reason.to_string(),
        }
    }
}

impl AudioSource for CaptureSource {
    fn name(&self) -> &str {
        "CaptureSource"
    }

    fn initialize(&mut self) -> Result<(), PipelineError> {
        if self.stream.is_some() {
            return Ok(());
        }
        if self.chunk_size == 0 {
            return Err(self.init_error("chunk size must be non-zero"));
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| self.init_error("no input device available"))?;
        self.device_name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());

        let rate = SampleRate(self.sample_rate);
        let supported = device
            .supported_input_configs()
            .map_err(|e| self.init_error(e))?
            .filter(|range| range.min_sample_rate() <= rate && rate <= range.max_sample_rate())
            .max_by_key(|range| range.sample_format() == SampleFormat::F32)
            .ok_or_else(|| {
                self.init_error(format!(
                    "device '{}' cannot capture at {} Hz",
                    self.device_name, self.sample_rate
                ))
            })?
            .with_sample_rate(rate);

        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let channels = config.channels as usize;

        let ring = HeapRb::<f32>::new(self.sample_rate as usize * RING_SECONDS);
        let (producer, consumer) = ring.split();
        let overflow = self.overflow.clone();

        let stream = match sample_format {
            SampleFormat::F32 => {
                build_stream::<f32>(&device, &config, channels, producer, overflow)
            }
            SampleFormat::I16 => {
                build_stream::<i16>(&device, &config, channels, producer, overflow)
            }
            SampleFormat::U16 => {
                build_stream::<u16>(&device, &config, channels, producer, overflow)
            }
            other => return Err(self.init_error(format!("unsupported sample format {other:?}"))),
        }
        .map_err(|e| self.init_error(e))?;

        log::info!(
            "🎙️ Input '{}': {} Hz, {} ch, {:?}",
            self.device_name,
            self.sample_rate,
            channels,
            sample_format
        );
        self.stream = Some(stream);
        self.consumer = Some(consumer);
        Ok(())
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        if self.reader.is_some() {
            return Err(PipelineError::AlreadyStarted("CaptureSource".to_string()));
        }
        let (Some(stream), Some(consumer)) = (self.stream.as_ref(), self.consumer.take()) else {
            return Err(self.init_error("start called before initialize"));
        };

        self.stop.store(false, Ordering::SeqCst);
        self.finished.store(false, Ordering::SeqCst);

        let publisher = self.publisher.clone();
        let stop = self.stop.clone();
        let chunk_size = self.chunk_size;
        let reader = thread::Builder::new()
            .name("capture-reader".to_string())
            .spawn(move || read_chunks(consumer, chunk_size, &publisher, &stop))
            .map_err(|source| PipelineError::Spawn {
                name: "capture-reader".to_string(),
                source,
            })?;
        self.reader = Some(reader);

        stream.play().map_err(|e| self.init_error(e))?;
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("[CaptureSource] pause failed: {}", e);
            }
        }
        self.stop.store(true, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                log::error!("[CaptureSource] reader thread panicked");
            }
        }
        self.finished.store(true, Ordering::SeqCst);

        let dropped = self.overflowed_samples();
        if dropped > 0 {
            log::warn!("[CaptureSource] ring buffer overflowed, {} samples dropped", dropped);
        }
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    fn publisher(&self) -> Arc<Publisher<AudioChunk>> {
        self.publisher.clone()
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    channels: usize,
    mut producer: HeapProd<f32>,
    overflow: Arc<AtomicU64>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = channels.max(1);
    let err_fn = |err| log::error!("Input stream error: {:?}", err);

    device.build_input_stream(
        config,
        move |data: &[T], _| {
            for frame in data.chunks(channels) {
                let sum: f32 = frame.iter().map(|&s| s.to_sample::<f32>()).sum();
                if producer.try_push(sum / frame.len() as f32).is_err() {
                    overflow.fetch_add(1, Ordering::Relaxed);
                }
            }
        },
        err_fn,
        None,
    )
}

/// Cuts the ring buffer into fixed-size chunks until asked to stop, then
/// publishes whatever is left, including a short final chunk.
fn read_chunks(
    mut consumer: HeapCons<f32>,
    chunk_size: usize,
    publisher: &Publisher<AudioChunk>,
    stop: &AtomicBool,
) {
    let mut pending: AudioChunk = Vec::with_capacity(chunk_size);
    let mut tmp = vec![0.0f32; chunk_size];

    loop {
        let stopping = stop.load(Ordering::SeqCst);
        let wanted = chunk_size - pending.len();
        let popped = consumer.pop_slice(&mut tmp[..wanted]);
        pending.extend_from_slice(&tmp[..popped]);

        if pending.len() == chunk_size {
            publisher.publish(std::mem::replace(
                &mut pending,
                Vec::with_capacity(chunk_size),
            ));
            continue;
        }
        if popped == 0 {
            if stopping {
                break;
            }
            thread::sleep(READER_IDLE);
        }
    }

    if !pending.is_empty() {
        publisher.publish(pending);
    }
}
