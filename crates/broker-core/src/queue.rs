use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, Notify};

use crate::QUEUE_CAPACITY;

/// Outcome of a non-blocking enqueue (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    Enqueued,
    Dropped,
}

/// A single bounded FIFO, generic over the entry type, shared by RecvQ,
/// SendQ and BroadcastQ. Built from a `Mutex<VecDeque<T>>` plus a `Notify` —
/// the tokio-idiomatic stand-in for the original's per-queue mutex +
/// condition variable pair (§4.1, §5 shared-resource policy).
pub struct BoundedQueue<T> {
    inner: Mutex<VecDeque<T>>,
    notify: Notify,
    stopping: AtomicBool,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            stopping: AtomicBool::new(false),
            capacity,
        }
    }

    /// Append `item` to the tail. Never awaits on backpressure: once the
    /// queue is at capacity the entry is dropped and the caller is told so,
    /// matching the "producer never blocks" rule (§4.1, §7, P1).
    pub async fn try_enqueue(&self, item: T) -> QueueOutcome {
        let mut guard = self.inner.lock().await;
        if guard.len() >= self.capacity {
            return QueueOutcome::Dropped;
        }
        guard.push_back(item);
        drop(guard);
        self.notify.notify_one();
        QueueOutcome::Enqueued
    }

    /// Wait for and remove the head entry. Returns `None` once `stop()` has
    /// been called and the queue has drained, so workers can exit their loop
    /// cleanly (§5 Cancellation).
    pub async fn dequeue(&self) -> Option<T> {
        loop {
            {
                let mut guard = self.inner.lock().await;
                if let Some(item) = guard.pop_front() {
                    return Some(item);
                }
                if self.stopping.load(Ordering::Acquire) {
                    return None;
                }
            }
            self.notify.notified().await;
            if self.stopping.load(Ordering::Acquire) {
                let mut guard = self.inner.lock().await;
                if let Some(item) = guard.pop_front() {
                    return Some(item);
                }
                return None;
            }
        }
    }

    /// Signal all waiting consumers to re-check the `stopping` flag (§5).
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<T> Default for BoundedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
