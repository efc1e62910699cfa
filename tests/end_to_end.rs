// tests/end_to_end.rs

use std::f32::consts::PI;
use std::time::Duration;

use bpm_finder::config::Config;
use bpm_finder::pipeline::assemble;
use bpm_finder::source::ReplaySource;

/// Silence with a full chunk of 1 kHz tone every `spacing` chunks.
fn click_track(sample_rate: u32, chunk_size: usize, spacing: usize, seconds: f32) -> Vec<f32> {
    let total = (sample_rate as f32 * seconds) as usize;
    (0..total)
        .map(|i| {
            let chunk = i / chunk_size;
            if chunk % spacing == 0 {
                let n = (i % chunk_size) as f32;
                (2.0 * PI * 1000.0 * n / sample_rate as f32).sin()
            } else {
                0.0
            }
        })
        .collect()
}

fn final_bpm(config: &Config, samples: Vec<f32>) -> Option<f32> {
    let source = ReplaySource::new(samples, config.pipeline.chunk_size);
    let assembly = assemble(config, source).unwrap();
    let mut pipeline = assembly.pipeline;

    pipeline.start().unwrap();
    pipeline.wait_for_source(Duration::from_millis(2));
    let report = pipeline.shutdown(Duration::from_secs(10));
    assert!(report.is_clean(), "{report:?}");

    assembly.bpm.latest()
}

#[test]
fn click_track_on_whole_chunk_grid_reads_120_bpm() {
    // 48 chunks per second, one click every 24 chunks = 0.5 s.
    let mut config = Config::default();
    config.pipeline.chunk_size = 1000;
    let samples = click_track(48000, 1000, 24, 20.0);

    let bpm = final_bpm(&config, samples).expect("no tempo estimate");
    assert!((bpm - 120.0).abs() <= 2.0, "bpm {bpm}");
}

#[test]
fn default_parameters_quantise_to_whole_chunks() {
    // At 46.875 chunks per second a 23-chunk click period is the closest
    // grid point to 0.5 s.
    let config = Config::default();
    let samples = click_track(48000, 1024, 23, 20.0);

    let bpm = final_bpm(&config, samples).expect("no tempo estimate");
    let expected = 60.0 * (48000.0 / 1024.0) / 23.0;
    assert!((bpm - expected).abs() < 0.01, "bpm {bpm}, expected {expected}");
    assert!((bpm - 120.0).abs() < 2.5);
}

#[test]
fn short_input_gives_no_estimate() {
    let config = Config::default();
    // Shorter than the 15 s peak window.
    let samples = click_track(48000, 1024, 23, 5.0);
    assert_eq!(final_bpm(&config, samples), None);
}
