use crate::action::QueuedAction;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// The shared FIFO of pending dashboard actions.
///
/// Multiple producers (dashboard request handlers) append, one consumer (the
/// queue processor) drains. The handle is cheap to clone; all clones share
/// the same queue. Nothing here is persisted, a restart loses pending
/// actions.
#[derive(Clone, Default)]
pub struct ActionQueue {
    inner: Arc<Mutex<VecDeque<QueuedAction>>>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the tail. Never blocks the producer.
    pub fn enqueue(&self, action: QueuedAction) {
        self.inner.lock().unwrap().push_back(action);
    }

    /// Head action without removing it.
    pub fn peek(&self) -> Option<QueuedAction> {
        self.inner.lock().unwrap().front().cloned()
    }

    /// Removes and returns the head action.
    pub fn dequeue(&self) -> Option<QueuedAction> {
        self.inner.lock().unwrap().pop_front()
    }

    /// Reinserts an action at the head, so a retry runs before anything that
    /// arrived later.
    pub fn requeue_front(&self, action: QueuedAction) {
        self.inner.lock().unwrap().push_front(action);
    }

    pub fn depth(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// A bounded sample of the queue head for diagnostics.
    pub fn preview(&self, limit: usize) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .map(|queued| {
                format!(
                    "{} (from {}, attempts {})",
                    queued.action.kind(),
                    queued.submitted_by,
                    queued.attempts
                )
            })
            .collect()
    }
}
