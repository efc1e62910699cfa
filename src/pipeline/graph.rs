// src/pipeline/graph.rs

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::dsp::result::AudioChunk;
use crate::error::PipelineError;
use crate::source::AudioSource;
use crate::stream::{Publisher, Stage, StageControl, StageRunner, StageStats, wait_until};

const SOURCE_POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeId {
    Source,
    Stage(usize),
}

/// Typed output of a node, used to attach downstream stages.
pub struct Port<T> {
    node: NodeId,
    publisher: Arc<Publisher<T>>,
    _item: PhantomData<fn() -> T>,
}

impl<T> Clone for Port<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node,
            publisher: self.publisher.clone(),
            _item: PhantomData,
        }
    }
}

struct Node {
    control: Box<dyn StageControl>,
    upstream: NodeId,
}

/// Collects stages into an arena. A stage can only be attached to a port
/// that already exists, so insertion order is a topological order.
pub struct PipelineBuilder {
    source: Box<dyn AudioSource>,
    source_port: Port<AudioChunk>,
    nodes: Vec<Node>,
    backlog_warning: Option<usize>,
}

impl PipelineBuilder {
    pub fn new(source: impl AudioSource + 'static) -> Self {
        let source_port = Port {
            node: NodeId::Source,
            publisher: source.publisher(),
            _item: PhantomData,
        };
        Self {
            source: Box::new(source),
            source_port,
            nodes: Vec::new(),
            backlog_warning: None,
        }
    }

    pub fn with_backlog_warning(mut self, depth: usize) -> Self {
        self.backlog_warning = Some(depth);
        self
    }

    pub fn source_port(&self) -> Port<AudioChunk> {
        self.source_port.clone()
    }

    /// Subscribes `stage` to `from` and returns the stage's own output port.
    pub fn add_stage<S>(&mut self, stage: S, from: &Port<S::Input>) -> Port<S::Output>
    where
        S: Stage,
        S::Input: Clone,
    {
        let runner = match self.backlog_warning {
            Some(depth) => StageRunner::with_backlog_warning(stage, depth),
            None => StageRunner::new(stage),
        };
        from.publisher.subscribe(runner.inbox());
        let port = Port {
            node: NodeId::Stage(self.nodes.len()),
            publisher: runner.outputs(),
            _item: PhantomData,
        };
        log::debug!("edge {:?} -> {}", from.node, runner.name());
        self.nodes.push(Node {
            control: Box::new(runner),
            upstream: from.node,
        });
        port
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            source: self.source,
            nodes: self.nodes,
            started: false,
        }
    }
}

/// Per-stage counters after shutdown.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    pub stages: Vec<StageStats>,
    /// Stages whose upstream did not finish within the drain timeout.
    pub timed_out: Vec<String>,
    pub panicked: Vec<String>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.timed_out.is_empty()
            && self.panicked.is_empty()
            && self.stages.iter().all(StageStats::is_drained)
    }

    pub fn stage(&self, name: &str) -> Option<&StageStats> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Items pushed to some stage but never processed.
    pub fn lost_items(&self) -> u64 {
        self.stages
            .iter()
            .map(|s| s.pushed.saturating_sub(s.processed))
            .sum()
    }
}

/// A frozen stage graph fed by one audio source.
pub struct Pipeline {
    source: Box<dyn AudioSource>,
    nodes: Vec<Node>,
    started: bool,
}

impl Pipeline {
    pub fn stage_names(&self) -> Vec<String> {
        self.nodes
            .iter()
            .map(|n| n.control.name().to_string())
            .collect()
    }

    pub fn stats(&self) -> Vec<StageStats> {
        self.nodes.iter().map(|n| n.control.stats()).collect()
    }

    pub fn source_finished(&self) -> bool {
        self.source.is_finished()
    }

    /// Starts every stage, downstream first, then initializes and starts the
    /// source. On failure everything already started is stopped again.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.started {
            return Err(PipelineError::AlreadyStarted("pipeline".to_string()));
        }

        for i in (0..self.nodes.len()).rev() {
            if let Err(e) = self.nodes[i].control.start() {
                self.abort_stages();
                return Err(e);
            }
        }

        let source_up = self
            .source
            .initialize()
            .and_then(|()| self.source.start());
        if let Err(e) = source_up {
            log::error!("❌ {}", e);
            self.source.stop();
            self.abort_stages();
            return Err(e);
        }

        self.started = true;
        log::info!(
            "▶️ Pipeline running: {} -> {} stages",
            self.source.name(),
            self.nodes.len()
        );
        Ok(())
    }

    /// Blocks until the source has nothing more to publish.
    pub fn wait_for_source(&self, poll: Duration) {
        while !self.source.is_finished() {
            std::thread::sleep(poll);
        }
    }

    /// Topological shutdown: the source stops first, and each stage is only
    /// asked to stop once its upstream has finished, so nothing can be pushed
    /// to it afterwards. `timeout` bounds each wait.
    pub fn shutdown(&mut self, timeout: Duration) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        log::info!("⏹️ Stopping {}", self.source.name());
        self.source.stop();

        for i in 0..self.nodes.len() {
            let upstream_done = match self.nodes[i].upstream {
                NodeId::Source => {
                    wait_until(timeout, SOURCE_POLL, || self.source.is_finished())
                }
                NodeId::Stage(u) => self.nodes[u].control.wait_finished(timeout),
            };
            let node = &mut self.nodes[i];
            if !upstream_done {
                log::warn!(
                    "⚠️ [{}] upstream still running after {:?}; stopping anyway",
                    node.control.name(),
                    timeout
                );
                report.timed_out.push(node.control.name().to_string());
            }
            node.control.request_stop();
        }

        for node in &mut self.nodes {
            if node.control.wait_finished(timeout) {
                if !node.control.join() {
                    report.panicked.push(node.control.name().to_string());
                }
            } else {
                node.control.detach();
                let name = node.control.name().to_string();
                if !report.timed_out.contains(&name) {
                    report.timed_out.push(name);
                }
            }
        }

        report.stages = self.stats();
        for s in &report.stages {
            if s.pushed != s.processed {
                log::warn!(
                    "⚠️ [{}] pushed {} but processed {} ({} lost)",
                    s.name,
                    s.pushed,
                    s.processed,
                    s.pushed.saturating_sub(s.processed)
                );
            }
        }
        self.started = false;
        log::info!("Pipeline stopped");
        report
    }

    fn abort_stages(&mut self) {
        for node in &mut self.nodes {
            node.control.request_stop();
        }
        for node in &mut self.nodes {
            node.control.join();
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.started {
            self.shutdown(Duration::from_secs(5));
        }
    }
}
