//! Queue of pending subtree executions.
//!
//! A parallel block turns every child into one [`SubtreeObject`] sharing a
//! [`Completion`]. Workers drain the queue; the spawning thread blocks on
//! the completion counter and pumps the queue itself while waiting, so
//! nesting parallel blocks deeper than the pool size cannot deadlock.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::error::SakuraError;
use crate::item::SakuraItem;
use crate::value::ValueMap;

/// One queued subtree execution.
pub(crate) struct SubtreeObject {
    /// Deep copy of the item to run; the worker owns it exclusively.
    pub item: SakuraItem,
    /// Deep copy of the spawning item's environment.
    pub env: ValueMap,
    /// Display hierarchy accumulated so far, for output blocks.
    pub hierarchy: Vec<String>,
    /// Source file of the spawning context, for diagnostics.
    pub file_path: String,
    /// Shared completion state of the batch this object belongs to.
    pub completion: Arc<Completion>,
}

struct CompletionState {
    remaining: usize,
    errors: Vec<SakuraError>,
}

/// Shared countdown and error bag of one parallel batch.
///
/// Errors accumulate — a failure never overwrites an earlier one, the bag
/// is folded into a single aggregate by the spawning thread.
pub(crate) struct Completion {
    state: Mutex<CompletionState>,
    done: Condvar,
}

impl Completion {
    pub fn new(count: usize) -> Self {
        Self {
            state: Mutex::new(CompletionState {
                remaining: count,
                errors: Vec::new(),
            }),
            done: Condvar::new(),
        }
    }

    /// Records one finished child, successful or not.
    pub fn finish(&self, result: Result<(), SakuraError>) {
        let mut state = self.state.lock().unwrap();
        if let Err(error) = result {
            state.errors.push(error);
        }
        state.remaining = state.remaining.saturating_sub(1);
        if state.remaining == 0 {
            self.done.notify_all();
        }
    }

    pub fn is_done(&self) -> bool {
        self.state.lock().unwrap().remaining == 0
    }

    /// Parks the caller until the counter may have changed.
    pub fn wait_timeout(&self, timeout: Duration) {
        let state = self.state.lock().unwrap();
        if state.remaining > 0 {
            let _ = self.done.wait_timeout(state, timeout).unwrap();
        }
    }

    /// Drains the collected errors. Call only after the counter hit zero.
    pub fn take_errors(&self) -> Vec<SakuraError> {
        std::mem::take(&mut self.state.lock().unwrap().errors)
    }
}

/// FIFO of pending subtree executions, shared by all workers.
pub(crate) struct SubtreeQueue {
    queue: Mutex<VecDeque<SubtreeObject>>,
    available: Condvar,
}

impl SubtreeQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    pub fn enqueue(&self, object: SubtreeObject) {
        self.queue.lock().unwrap().push_back(object);
        self.available.notify_one();
    }

    /// Non-blocking pop, used by helping waiters.
    pub fn try_dequeue(&self) -> Option<SubtreeObject> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Blocking pop with a timeout, used by pool workers.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<SubtreeObject> {
        let mut queue = self.queue.lock().unwrap();
        if let Some(object) = queue.pop_front() {
            return Some(object);
        }
        let (mut queue, _) = self.available.wait_timeout(queue, timeout).unwrap();
        queue.pop_front()
    }

    /// Wakes every blocked worker, used on shutdown.
    pub fn notify_all(&self) {
        self.available.notify_all();
    }
}
