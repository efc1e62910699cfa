// tests/shutdown.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use bpm_finder::AudioChunk;
use bpm_finder::pipeline::PipelineBuilder;
use bpm_finder::source::ReplaySource;
use bpm_finder::stream::{Stage, StageRunner, Subscriber, wait_until};

/// Does a little arithmetic so stages take measurable time.
struct Smooth {
    name: String,
    last: f32,
}

impl Smooth {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            last: 0.0,
        }
    }
}

impl Stage for Smooth {
    type Input = AudioChunk;
    type Output = AudioChunk;

    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&mut self, chunk: AudioChunk) -> Option<AudioChunk> {
        let out = chunk
            .into_iter()
            .map(|s| {
                self.last = 0.9 * self.last + 0.1 * s;
                self.last
            })
            .collect();
        Some(out)
    }
}

/// Passes chunks through after a fixed delay.
struct Slow {
    name: String,
    delay: Duration,
}

impl Stage for Slow {
    type Input = AudioChunk;
    type Output = AudioChunk;

    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&mut self, chunk: AudioChunk) -> Option<AudioChunk> {
        thread::sleep(self.delay);
        Some(chunk)
    }
}

#[test]
fn ordered_shutdown_while_source_publishes_loses_nothing() {
    // Far more audio than can be processed before shutdown begins.
    let source = ReplaySource::new(vec![0.25; 4_000_000], 64);
    let mut builder = PipelineBuilder::new(source);
    let mut port = builder.source_port();
    for i in 0..5 {
        port = builder.add_stage(Smooth::new(&format!("smooth-{i}")), &port);
    }
    let mut pipeline = builder.build();

    pipeline.start().unwrap();
    thread::sleep(Duration::from_millis(20));
    let report = pipeline.shutdown(Duration::from_secs(30));

    assert!(report.timed_out.is_empty(), "{report:?}");
    assert_eq!(report.stages.len(), 5);
    for s in &report.stages {
        assert_eq!(s.pushed, s.processed, "{} lost items", s.name);
        assert_eq!(s.queued, 0);
    }
    // Every stage saw exactly what its upstream produced.
    let first = report.stages[0].pushed;
    assert!(first > 0);
    assert!(report.stages.iter().all(|s| s.pushed == first));
    assert_eq!(report.lost_items(), 0);
}

#[test]
fn naive_shutdown_can_lose_items() {
    let mut first = StageRunner::new(Smooth::new("first"));
    let mut second = StageRunner::new(Smooth::new("second"));
    first.subscribe(second.inbox());
    second.start().unwrap();
    first.start().unwrap();

    let inbox = first.inbox();
    let producing = Arc::new(AtomicBool::new(true));
    let producer = {
        let inbox = inbox.clone();
        let producing = producing.clone();
        thread::spawn(move || {
            while producing.load(Ordering::SeqCst) {
                inbox.push(vec![0.5; 64]);
                thread::sleep(Duration::from_micros(200));
            }
        })
    };

    thread::sleep(Duration::from_millis(10));
    // Stop in downstream-blind order while the producer keeps going.
    first.stop();
    second.stop();
    let processed = first.stats().processed;

    let lost = wait_until(Duration::from_secs(5), Duration::from_millis(1), || {
        inbox.pushed() > processed
    });
    producing.store(false, Ordering::SeqCst);
    producer.join().unwrap();

    assert!(lost, "producer never pushed after stop");
    let stats = first.stats();
    assert!(stats.pushed > stats.processed);
    assert_eq!(stats.processed, processed);
}

#[test]
fn drain_timeout_is_reported_and_loss_is_visible() {
    let source = ReplaySource::new(vec![0.0; 50 * 64], 64);
    let mut builder = PipelineBuilder::new(source);
    let mut port = builder.source_port();
    for name in ["a", "b"] {
        let stage = Slow {
            name: name.to_string(),
            delay: Duration::from_millis(20),
        };
        port = builder.add_stage(stage, &port);
    }
    let mut pipeline = builder.build();

    pipeline.start().unwrap();
    pipeline.wait_for_source(Duration::from_millis(1));
    let report = pipeline.shutdown(Duration::from_millis(30));

    assert!(!report.is_clean(), "{report:?}");
    assert!(!report.timed_out.is_empty());
    assert!(report.timed_out.iter().any(|name| name == "a"));
    let a = report.stage("a").unwrap();
    assert_eq!(a.pushed, 50);
    assert!(a.pushed > a.processed || a.queued > 0, "{a:?}");
    assert!(report.lost_items() > 0);
}
