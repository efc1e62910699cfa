// src/stream/stage.rs

use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::PipelineError;
use crate::stream::inbox::Inbox;
use crate::stream::publisher::{Publisher, Subscriber};

/// One processing step. All state lives behind `transform`, which is only
/// ever called from the stage's single worker thread, in push order.
pub trait Stage: Send + 'static {
    type Input: Send + 'static;
    type Output: Clone + Send + 'static;

    fn name(&self) -> &str;

    /// `None` means "nothing to forward for this input".
    fn transform(&mut self, input: Self::Input) -> Option<Self::Output>;

    /// Called once on the worker thread after the final drain.
    fn finish(&mut self) {}
}

/// Counter snapshot for one stage. `pushed > processed` after shutdown means loss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStats {
    pub name: String,
    pub pushed: u64,
    pub processed: u64,
    pub queued: usize,
}

impl StageStats {
    pub fn is_drained(&self) -> bool {
        self.pushed == self.processed && self.queued == 0
    }
}

/// Object-safe lifecycle view of a running stage, used by the pipeline arena.
pub trait StageControl: Send {
    fn name(&self) -> &str;
    fn start(&mut self) -> Result<(), PipelineError>;
    fn request_stop(&mut self);
    fn is_running(&self) -> bool;
    fn is_finished(&self) -> bool;
    fn wait_finished(&self, timeout: Duration) -> bool;
    /// Joins the worker. Returns false if the worker panicked.
    fn join(&mut self) -> bool;
    /// Abandons a worker that did not finish in time; its thread keeps running.
    fn detach(&mut self);
    fn stats(&self) -> StageStats;
}

#[derive(Default)]
struct Completion {
    done: Mutex<bool>,
    signal: Condvar,
}

impl Completion {
    fn reset(&self) {
        *self.done.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    fn set(&self) {
        *self.done.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.signal.notify_all();
    }

    fn is_set(&self) -> bool {
        *self.done.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait(&self, timeout: Duration) -> bool {
        let guard = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .signal
            .wait_timeout_while(guard, timeout, |done| !*done)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

// Marks the worker finished even if the transform panics.
struct FinishedOnDrop(Arc<Completion>);

impl Drop for FinishedOnDrop {
    fn drop(&mut self) {
        self.0.set();
    }
}

/// Owns a stage, its input queue, its output publisher and its worker thread.
pub struct StageRunner<S: Stage> {
    name: String,
    stage: Option<S>,
    inbox: Arc<Inbox<S::Input>>,
    outputs: Arc<Publisher<S::Output>>,
    worker: Option<JoinHandle<S>>,
    completion: Arc<Completion>,
}

impl<S: Stage> StageRunner<S> {
    pub fn new(stage: S) -> Self {
        let name = stage.name().to_string();
        let inbox = Arc::new(Inbox::new(name.clone()));
        Self::with_inbox(stage, inbox)
    }

    pub fn with_backlog_warning(stage: S, depth: usize) -> Self {
        let name = stage.name().to_string();
        let inbox = Arc::new(Inbox::new(name).with_backlog_warning(depth));
        Self::with_inbox(stage, inbox)
    }

    fn with_inbox(stage: S, inbox: Arc<Inbox<S::Input>>) -> Self {
        let completion = Arc::new(Completion::default());
        // Never started counts as finished: it will not produce anything.
        completion.set();
        Self {
            name: stage.name().to_string(),
            stage: Some(stage),
            inbox,
            outputs: Arc::new(Publisher::new()),
            worker: None,
            completion,
        }
    }

    pub fn inbox(&self) -> Arc<Inbox<S::Input>> {
        self.inbox.clone()
    }

    pub fn outputs(&self) -> Arc<Publisher<S::Output>> {
        self.outputs.clone()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber<S::Output>>) {
        self.outputs.subscribe(subscriber);
    }

    /// The stage value, available while the worker is not running.
    pub fn stage(&self) -> Option<&S> {
        self.stage.as_ref()
    }

    /// Spawns the worker and returns once it is parked on the queue.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        let Some(stage) = self.stage.take() else {
            return Err(PipelineError::AlreadyStarted(self.name.clone()));
        };

        self.completion.reset();
        self.inbox.set_running(true);

        let (ready_tx, ready_rx) = mpsc::channel();
        let inbox = self.inbox.clone();
        let outputs = self.outputs.clone();
        let finished = FinishedOnDrop(self.completion.clone());

        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let _finished = finished;
                run_worker(stage, inbox, outputs, ready_tx)
            })
            .map_err(|source| PipelineError::Spawn {
                name: self.name.clone(),
                source,
            })?;

        // A dropped sender means the worker died before parking; join will report it.
        let _ = ready_rx.recv();
        self.worker = Some(handle);
        log::debug!("[{}] worker started", self.name);
        Ok(())
    }

    /// Asks the worker to exit once its queue is empty. Does not wait.
    pub fn request_stop(&mut self) {
        self.inbox.set_running(false);
    }

    /// Naive stop: drains what is queued right now, then joins.
    /// Items pushed after this returns are never processed.
    pub fn stop(&mut self) {
        self.request_stop();
        self.join_worker();
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some() && !self.completion.is_set()
    }

    pub fn is_finished(&self) -> bool {
        self.completion.is_set()
    }

    pub fn wait_finished(&self, timeout: Duration) -> bool {
        self.completion.wait(timeout)
    }

    pub fn stats(&self) -> StageStats {
        StageStats {
            name: self.name.clone(),
            pushed: self.inbox.pushed(),
            processed: self.inbox.processed(),
            queued: self.inbox.queued(),
        }
    }

    pub fn detach(&mut self) {
        if self.worker.take().is_some() {
            log::warn!("[{}] worker detached while still running", self.name);
        }
    }

    fn join_worker(&mut self) -> bool {
        let Some(handle) = self.worker.take() else {
            return true;
        };
        match handle.join() {
            Ok(stage) => {
                self.stage = Some(stage);
                log::debug!("[{}] worker joined", self.name);
                true
            }
            Err(_) => {
                log::error!("[{}] worker panicked", self.name);
                false
            }
        }
    }
}

impl<S: Stage> StageControl for StageRunner<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        StageRunner::start(self)
    }

    fn request_stop(&mut self) {
        StageRunner::request_stop(self)
    }

    fn is_running(&self) -> bool {
        StageRunner::is_running(self)
    }

    fn is_finished(&self) -> bool {
        StageRunner::is_finished(self)
    }

    fn wait_finished(&self, timeout: Duration) -> bool {
        StageRunner::wait_finished(self, timeout)
    }

    fn join(&mut self) -> bool {
        self.join_worker()
    }

    fn detach(&mut self) {
        StageRunner::detach(self)
    }

    fn stats(&self) -> StageStats {
        StageRunner::stats(self)
    }
}

impl<S: Stage> Drop for StageRunner<S> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}

fn run_worker<S: Stage>(
    mut stage: S,
    inbox: Arc<Inbox<S::Input>>,
    outputs: Arc<Publisher<S::Output>>,
    ready: mpsc::Sender<()>,
) -> S {
    let mut state = inbox.lock();
    let _ = ready.send(());

    loop {
        state = inbox.wait(state);
        if state.items.is_empty() && !state.running {
            break;
        }

        // Drain everything queued before looking at the running flag again.
        while let Some(item) = state.items.pop_front() {
            drop(state);
            if let Some(out) = stage.transform(item) {
                outputs.publish(out);
            }
            inbox.mark_processed();
            state = inbox.lock();
        }
    }
    drop(state);

    stage.finish();
    stage
}

/// Blocks until `cond` holds or `timeout` elapses. Returns whether it held.
pub fn wait_until(timeout: Duration, poll: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep(poll.min(deadline - now));
    }
}
