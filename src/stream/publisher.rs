// src/stream/publisher.rs

use std::sync::{Arc, Mutex, PoisonError};

/// Anything that can receive a copy of a published item.
/// Implementations must never block on consumer work.
pub trait Subscriber<T>: Send + Sync {
    fn push(&self, item: T);
}

/// Fan-out broadcaster. Every subscriber gets its own copy of each item,
/// in the same order `publish` was called.
pub struct Publisher<T> {
    subscribers: Mutex<Vec<Arc<dyn Subscriber<T>>>>,
}

impl<T: Clone + Send> Publisher<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Safe to call at any time, including while another thread is publishing.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let mut subs = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subs.push(subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn publish(&self, item: T) {
        // The lock is held only while items are copied into the subscriber queues.
        let subs = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let Some((last, rest)) = subs.split_last() else {
            return;
        };
        for sub in rest {
            sub.push(item.clone());
        }
        last.push(item);
    }
}

impl<T: Clone + Send> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}
