use crate::batch::{ErrorChannel, Task, TaskId};
use futures::executor::block_on;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::unconstrained;

pub(crate) type WorkSender = mpsc::UnboundedSender<WorkItem>;
pub(crate) type SharedWorkReceiver = Arc<Mutex<mpsc::UnboundedReceiver<WorkItem>>>;
pub(crate) type CompletionSender = mpsc::UnboundedSender<Completion>;

pub(crate) fn work_queue() -> (WorkSender, SharedWorkReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, Arc::new(Mutex::new(rx)))
}

/// One task plus the handles its worker reports back through.
pub(crate) struct WorkItem {
    pub(crate) task: Task,
    pub(crate) errors: Arc<ErrorChannel>,
    pub(crate) completion_tx: CompletionSender,
}

/// Emitted once per submitted task, whether the task succeeded or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub task_id: TaskId,
    pub worker_id: usize,
    pub elapsed: Duration,
}

/// Completion signals of one submission, yielded in the order tasks finish.
///
/// Iterating blocks the calling thread. It also works on a thread that is inside a tokio
/// runtime, although async callers should still prefer `spawn_blocking`.
#[derive(Debug)]
pub struct Completions {
    rx: mpsc::UnboundedReceiver<Completion>,
    expected: usize,
    received: usize,
}

impl Completions {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Completion>, expected: usize) -> Self {
        Self {
            rx,
            expected,
            received: 0,
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn received(&self) -> usize {
        self.received
    }
}

impl Iterator for Completions {
    type Item = Completion;

    fn next(&mut self) -> Option<Completion> {
        if self.received >= self.expected {
            return None;
        }

        // Opt out of tokio's coop budget: it is never replenished under a foreign
        // `block_on`, so a runtime thread would otherwise spin once it runs dry.
        // `None` means every sender is gone: the pool lost work items.
        let completion = block_on(unconstrained(self.rx.recv()))?;
        self.received += 1;
        Some(completion)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.expected - self.received))
    }
}
