// tests/sinks.rs

use std::path::Path;
use std::time::Duration;

use bpm_finder::config::Config;
use bpm_finder::pipeline::assemble;
use bpm_finder::sink::BinFileSink;
use bpm_finder::source::ReplaySource;
use bpm_finder::stream::{StageRunner, Subscriber};
use bpm_finder::AudioChunk;

fn le_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[test]
fn chunks_are_dumped_bit_exact_without_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("raw.bin");

    let chunks: Vec<AudioChunk> = vec![
        vec![0.0, -0.0, 1.0, -1.0],
        vec![f32::MIN_POSITIVE, f32::MAX, 1e-30, 0.1],
        vec![3.25],
    ];

    let mut runner = StageRunner::new(BinFileSink::<AudioChunk>::create(&path).unwrap());
    let inbox = runner.inbox();
    runner.start().unwrap();
    for chunk in &chunks {
        inbox.push(chunk.clone());
    }
    runner.stop();

    let expected: Vec<u8> = chunks.iter().flat_map(|c| le_bytes(c)).collect();
    assert_eq!(std::fs::read(&path).unwrap(), expected);
}

#[test]
fn scalar_sink_writes_four_bytes_per_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("values.bin");

    let mut runner = StageRunner::new(BinFileSink::<f32>::create(&path).unwrap());
    let inbox = runner.inbox();
    runner.start().unwrap();
    for v in [1.5f32, -2.0, 0.125] {
        inbox.push(v);
    }
    runner.stop();

    assert_eq!(std::fs::read(&path).unwrap(), le_bytes(&[1.5, -2.0, 0.125]));
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

#[test]
fn assembled_taps_record_every_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let samples: Vec<f32> = (0..10 * 256).map(|i| ((i % 97) as f32 / 97.0) - 0.5).collect();

    let mut config = Config::default();
    config.pipeline.chunk_size = 256;
    config.recording.dir = Some(dir.path().to_path_buf());
    config.recording.wav = true;

    let assembly = assemble(&config, ReplaySource::new(samples.clone(), 256)).unwrap();
    let mut pipeline = assembly.pipeline;
    pipeline.start().unwrap();
    pipeline.wait_for_source(Duration::from_millis(1));
    let report = pipeline.shutdown(Duration::from_secs(5));
    assert!(report.is_clean(), "{report:?}");

    assert_eq!(std::fs::read(dir.path().join("raw.bin")).unwrap(), le_bytes(&samples));
    assert_eq!(file_len(&dir.path().join("bandpass.bin")), 10 * 256 * 4);
    assert_eq!(file_len(&dir.path().join("energy.bin")), 10 * 4);
    assert_eq!(file_len(&dir.path().join("onset.bin")), 10 * 4);

    let reader = hound::WavReader::open(dir.path().join("input.wav")).unwrap();
    assert_eq!(reader.len() as usize, samples.len());

    let written: u64 = assembly
        .recordings
        .iter()
        .filter(|(name, _)| name == "energy.bin")
        .map(|(_, stats)| stats.written())
        .sum();
    assert_eq!(written, 10);
}

#[test]
fn broken_recording_dir_fails_assembly() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, b"x").unwrap();

    let mut config = Config::default();
    config.recording.dir = Some(blocker.join("sub"));
    assert!(assemble(&config, ReplaySource::new(vec![0.0; 16], 16)).is_err());
}
