//! Accumulates the task invocations of one execution cycle.

mod task;

pub use task::{FailureKind, Task, TaskFailure, TaskId};

use crate::channel::CrossWorkerChannel;
use anyhow::Error as AnyError;
use std::sync::Arc;

/// Channel every task of a batch reports its failures to.
pub type ErrorChannel = CrossWorkerChannel<TaskFailure>;

/// Ordered set of pending tasks sharing one error channel.
#[derive(Debug)]
pub struct TaskBatch {
    tasks: Vec<Task>,
    errors: Arc<ErrorChannel>,
    next_id: usize,
}

impl TaskBatch {
    pub fn new(errors: Arc<ErrorChannel>) -> Self {
        Self {
            tasks: Vec::new(),
            errors,
            next_id: 0,
        }
    }

    /// Binds `callable` to each argument value and queues one task per value.
    ///
    /// Pass a tuple per invocation for positional arguments. Returns how many tasks were added.
    pub fn register<F, A, R, E, I>(&mut self, callable: F, arguments: I) -> usize
    where
        F: Fn(A) -> Result<R, E> + Send + Sync + 'static,
        A: Send + 'static,
        E: Into<AnyError>,
        I: IntoIterator<Item = A>,
    {
        let callable = Arc::new(callable);
        let before = self.tasks.len();

        for args in arguments {
            let callable = Arc::clone(&callable);
            let id = TaskId::new(self.next_id);
            self.next_id += 1;
            self.tasks.push(Task::new(
                id,
                Box::new(move || callable(args).map(drop).map_err(Into::into)),
            ));
        }

        self.tasks.len() - before
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Hands every accumulated task over to the caller.
    pub fn drain_tasks(&mut self) -> Vec<Task> {
        std::mem::take(&mut self.tasks)
    }

    /// Drops pending tasks and drains the error channel, ready for the next cycle.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.next_id = 0;
        let discarded = self.errors.drain_all().len();
        if discarded > 0 {
            tracing::debug!(discarded, "dropped undrained task failures while clearing batch");
        }
    }

    pub fn errors(&self) -> &Arc<ErrorChannel> {
        &self.errors
    }
}
