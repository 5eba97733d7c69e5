use crate::batch::TaskFailure;
use crate::runtime::telemetry::Telemetry;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError};
use std::time::Instant;

use super::types::{Completion, SharedWorkReceiver, WorkItem};

/// Body of one pool thread: pulls work items until the queue is closed.
pub(crate) struct Worker {
    id: usize,
    queue: SharedWorkReceiver,
    telemetry: Arc<Telemetry>,
}

impl Worker {
    pub(crate) fn new(id: usize, queue: SharedWorkReceiver, telemetry: Arc<Telemetry>) -> Self {
        Self {
            id,
            queue,
            telemetry,
        }
    }

    pub(crate) fn run(self) {
        tracing::debug!(worker = self.id, "worker thread started");

        while let Some(item) = self.next_item() {
            self.execute(item);
        }

        tracing::debug!(worker = self.id, "work queue closed; worker exiting");
    }

    fn next_item(&self) -> Option<WorkItem> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.blocking_recv()
    }

    fn execute(&self, item: WorkItem) {
        let WorkItem {
            task,
            errors,
            completion_tx,
        } = item;
        let task_id = task.id();
        let started = Instant::now();

        match panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
            Ok(Ok(())) => self.telemetry.record_task_succeeded(),
            Ok(Err(error)) => {
                let rendered = format!("{error:#}");
                tracing::warn!(
                    worker = self.id,
                    task = %task_id,
                    error = %rendered,
                    "task failed"
                );
                self.telemetry.record_task_failed();
                errors.append(TaskFailure::errored(task_id, self.id, error));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(
                    worker = self.id,
                    task = %task_id,
                    panic = %message,
                    "task panicked"
                );
                self.telemetry.record_task_panicked();
                errors.append(TaskFailure::panicked(task_id, self.id, message));
            }
        }

        // The failure is already on the channel, so once the coordinator has seen every
        // completion it can drain without racing this worker.
        let completion = Completion {
            task_id,
            worker_id: self.id,
            elapsed: started.elapsed(),
        };
        if completion_tx.send(completion).is_err() {
            tracing::warn!(
                worker = self.id,
                task = %task_id,
                "completion receiver dropped before task finished"
            );
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
