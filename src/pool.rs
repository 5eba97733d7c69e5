//! Fixed-size pool of worker threads.
//!
//! Submitted tasks go through one shared queue; each worker runs the task,
//! diverts any failure to the batch's error channel, and always reports a
//! completion. The pool therefore yields exactly one completion per submitted
//! task regardless of how the tasks end.

mod types;
mod worker;


pub use types::{Completion, Completions};

use crate::batch::{ErrorChannel, Task};
use crate::runtime::telemetry::Telemetry;
use anyhow::{anyhow, Context, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;

use types::{work_queue, WorkItem, WorkSender};
use worker::Worker;

pub struct WorkerPoolParams {
    pub worker_count: usize,
    pub thread_name_prefix: String,
    pub telemetry: Arc<Telemetry>,
}

pub struct WorkerPool {
    worker_count: usize,
    work_tx: Mutex<Option<WorkSender>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    telemetry: Arc<Telemetry>,
}

impl WorkerPool {
    /// Spawns `worker_count` threads (at least one) that stay alive until [`WorkerPool::release`].
    pub fn new(params: WorkerPoolParams) -> Result<Self> {
        let worker_count = params.worker_count.max(1);
        let (work_tx, work_rx) = work_queue();
        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let worker = Worker::new(worker_id, Arc::clone(&work_rx), Arc::clone(&params.telemetry));
            let handle = thread::Builder::new()
                .name(format!("{}-{worker_id}", params.thread_name_prefix))
                .spawn(move || worker.run())
                .with_context(|| format!("failed to spawn worker thread {worker_id}"))?;
            workers.push(handle);
        }

        params.telemetry.record_worker_pool_size(worker_count);
        tracing::debug!(workers = worker_count, "worker pool started");

        Ok(Self {
            worker_count,
            work_tx: Mutex::new(Some(work_tx)),
            workers: Mutex::new(workers),
            telemetry: params.telemetry,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn is_released(&self) -> bool {
        lock(&self.work_tx).is_none()
    }

    /// Queues every task and returns their completions in finishing order.
    ///
    /// Task failures never surface here; workers append them to `errors` before signalling
    /// completion.
    pub fn submit_unordered(&self, tasks: Vec<Task>, errors: &Arc<ErrorChannel>) -> Result<Completions> {
        let sender = lock(&self.work_tx)
            .clone()
            .context("worker pool has been released")?;

        let expected = tasks.len();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        for task in tasks {
            let task_id = task.id();
            let item = WorkItem {
                task,
                errors: Arc::clone(errors),
                completion_tx: completion_tx.clone(),
            };
            sender
                .send(item)
                .map_err(|_| anyhow!("work queue closed before task {task_id} was queued"))?;
            self.telemetry.record_task_submitted();
        }

        Ok(Completions::new(completion_rx, expected))
    }

    /// Closes the work queue and joins every worker. Calling it again is a no-op.
    pub fn release(&self) {
        let sender = lock(&self.work_tx).take();
        let handles = std::mem::take(&mut *lock(&self.workers));
        if sender.is_none() && handles.is_empty() {
            return;
        }
        drop(sender);

        let current = thread::current().id();
        let joined = handles.len();
        for (worker_id, handle) in handles.into_iter().enumerate() {
            // A worker can end up dropping the pool itself; it exits on its own once the queue drains.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::error!(worker = worker_id, "worker thread terminated abnormally");
            }
        }

        self.telemetry.record_worker_pool_size(0);
        tracing::debug!(workers = joined, "worker pool released");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.release();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
