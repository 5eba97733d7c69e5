//! Unbounded queue shared between worker threads and the coordinating thread.
//!
//! Workers only ever append; the coordinator drains once it has observed every
//! completion of a batch. Draining takes the whole backlog under a single lock
//! acquisition so nothing appended before the drain can be left behind.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Thread-safe unbounded FIFO used to move values across worker boundaries.
#[derive(Debug)]
pub struct CrossWorkerChannel<T> {
    values: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> CrossWorkerChannel<T> {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Appends a value. Safe to call concurrently from any thread.
    pub fn append(&self, value: T) {
        let mut values = self.lock();
        values.push_back(value);
        drop(values);
        self.available.notify_one();
    }

    /// Takes every queued value in arrival order and leaves the channel empty.
    pub fn drain_all(&self) -> Vec<T> {
        let mut values = self.lock();
        std::mem::take(&mut *values).into()
    }

    /// Removes the oldest value, waiting for a producer if the channel is empty.
    pub fn pop_blocking(&self) -> T {
        let mut values = self.lock();
        loop {
            if let Some(value) = values.pop_front() {
                return value;
            }
            values = self
                .available
                .wait(values)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Advisory only while producers are still active.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    // Every critical section leaves the deque consistent, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for CrossWorkerChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}
