// src/stream/inbox.rs

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::stream::publisher::Subscriber;

pub(crate) struct InboxState<T> {
    pub(crate) items: VecDeque<T>,
    pub(crate) running: bool,
}

/// Unbounded FIFO queue feeding one stage worker.
///
/// `push` never blocks on the consumer. The running flag shares the queue's
/// mutex, so a stop request can't slip in between the emptiness check and the wait.
pub struct Inbox<T> {
    state: Mutex<InboxState<T>>,
    ready: Condvar,
    pushed: AtomicU64,
    processed: AtomicU64,
    backlog_warning: Option<usize>,
    over_backlog: AtomicBool,
    label: String,
}

impl<T: Send> Inbox<T> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(InboxState {
                items: VecDeque::new(),
                running: false,
            }),
            ready: Condvar::new(),
            pushed: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            backlog_warning: None,
            over_backlog: AtomicBool::new(false),
            label: label.into(),
        }
    }

    /// Log a warning whenever the queue depth crosses `depth`.
    pub fn with_backlog_warning(mut self, depth: usize) -> Self {
        self.backlog_warning = Some(depth.max(1));
        self
    }

    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::SeqCst)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn queued(&self) -> usize {
        self.lock().items.len()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, InboxState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until there is an item or the inbox is no longer running.
    pub(crate) fn wait<'a>(
        &self,
        guard: MutexGuard<'a, InboxState<T>>,
    ) -> MutexGuard<'a, InboxState<T>> {
        self.ready
            .wait_while(guard, |s| s.items.is_empty() && s.running)
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_running(&self, running: bool) {
        {
            let mut state = self.lock();
            state.running = running;
        }
        self.ready.notify_all();
    }

    pub(crate) fn mark_processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    fn check_backlog(&self, depth: usize) {
        let Some(limit) = self.backlog_warning else {
            return;
        };
        if depth >= limit {
            if !self.over_backlog.swap(true, Ordering::Relaxed) {
                log::warn!(
                    "[{}] queue backlog reached {} items (pushed {}, processed {})",
                    self.label,
                    depth,
                    self.pushed(),
                    self.processed()
                );
            }
        } else if depth < limit / 2 {
            self.over_backlog.store(false, Ordering::Relaxed);
        }
    }
}

impl<T: Send> Subscriber<T> for Inbox<T> {
    fn push(&self, item: T) {
        let depth = {
            let mut state = self.lock();
            state.items.push_back(item);
            self.pushed.fetch_add(1, Ordering::SeqCst);
            state.items.len()
        };
        self.ready.notify_one();
        self.check_backlog(depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_counts_and_keeps_fifo_order() {
        let inbox = Inbox::new("test");
        for i in 0..4 {
            inbox.push(i);
        }
        assert_eq!(inbox.pushed(), 4);
        assert_eq!(inbox.processed(), 0);
        assert_eq!(inbox.queued(), 4);

        let items: Vec<i32> = inbox.lock().items.drain(..).collect();
        assert_eq!(items, vec![0, 1, 2, 3]);
    }

    #[test]
    fn wait_returns_immediately_when_stopped() {
        let inbox: Inbox<u8> = Inbox::new("test");
        inbox.set_running(false);
        let guard = inbox.wait(inbox.lock());
        assert!(guard.items.is_empty());
        assert!(!guard.running);
    }
}
