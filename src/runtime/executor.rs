use crate::batch::{ErrorChannel, Task, TaskBatch};
use crate::pool::{WorkerPool, WorkerPoolParams};
use crate::runtime::config::ExecutorConfig;
use crate::runtime::failure::{AggregatedFailure, BatchSummary, ConsistencyError, ExecutorError};
use crate::runtime::progress::ProgressReporter;
use crate::runtime::telemetry::{Telemetry, TelemetrySnapshot};
use anyhow::Error as AnyError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Lifecycle of a [`BatchExecutor`]. A finished run, failed or not, always returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    Running,
    Released,
}

struct ExecutorInner {
    state: ExecutorState,
    batch: TaskBatch,
    batches_started: u64,
}

/// Runs registered tasks on a fixed worker pool and reports every failure at the end.
///
/// Every method takes `&self`, so the executor can be shared behind an `Arc`; the state lock
/// makes registration, the start of a run, and release mutually exclusive.
pub struct BatchExecutor {
    config: ExecutorConfig,
    inner: Mutex<ExecutorInner>,
    errors: Arc<ErrorChannel>,
    pool: WorkerPool,
    telemetry: Arc<Telemetry>,
}

impl BatchExecutor {
    /// Starts an executor with one worker per available CPU.
    pub fn new(show_progress: bool) -> Result<Self, ExecutorError> {
        let config = ExecutorConfig::builder()
            .show_progress(show_progress)
            .build()
            .map_err(ExecutorError::Config)?;
        Self::with_config(config)
    }

    pub fn with_config(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        config.validate().map_err(ExecutorError::Config)?;

        let telemetry = Arc::new(Telemetry::default());
        let pool = WorkerPool::new(WorkerPoolParams {
            worker_count: config.worker_count(),
            thread_name_prefix: config.thread_name_prefix().to_owned(),
            telemetry: Arc::clone(&telemetry),
        })
        .map_err(ExecutorError::Pool)?;
        let errors = Arc::new(ErrorChannel::new());

        Ok(Self {
            inner: Mutex::new(ExecutorInner {
                state: ExecutorState::Idle,
                batch: TaskBatch::new(Arc::clone(&errors)),
                batches_started: 0,
            }),
            config,
            errors,
            pool,
            telemetry,
        })
    }

    /// Queues one task per argument value for the next [`BatchExecutor::run`].
    pub fn register<F, A, R, E, I>(&self, callable: F, arguments: I) -> Result<usize, ExecutorError>
    where
        F: Fn(A) -> Result<R, E> + Send + Sync + 'static,
        A: Send + 'static,
        E: Into<AnyError>,
        I: IntoIterator<Item = A>,
    {
        let mut inner = self.lock();
        let state = inner.state;
        match state {
            ExecutorState::Idle => Ok(inner.batch.register(callable, arguments)),
            ExecutorState::Running => Err(ConsistencyError::RegisterWhileRunning.into()),
            ExecutorState::Released => Err(ConsistencyError::Released.into()),
        }
    }

    /// Runs every registered task to completion, blocking the calling thread.
    ///
    /// From async code call it through `tokio::task::spawn_blocking`.
    ///
    /// Returns the batch summary when all tasks succeeded, otherwise a single
    /// [`ExecutorError::Failed`] carrying every task failure. Either way the executor is
    /// idle and empty afterwards.
    #[tracing::instrument(name = "batch", skip_all, fields(batch = tracing::field::Empty))]
    pub fn run(&self) -> Result<BatchSummary, ExecutorError> {
        let (tasks, sequence) = self.begin()?;
        tracing::Span::current().record("batch", sequence);
        let _cycle = CycleGuard { executor: self };

        self.execute(tasks)
    }

    /// Stops the worker pool. Only valid while idle; a second call does nothing.
    pub fn release(&self) -> Result<(), ExecutorError> {
        {
            let mut inner = self.lock();
            match inner.state {
                ExecutorState::Idle => {}
                ExecutorState::Running => {
                    return Err(ConsistencyError::ReleaseWhileRunning.into());
                }
                ExecutorState::Released => return Ok(()),
            }
            inner.state = ExecutorState::Released;
            inner.batch.clear();
        }

        self.pool.release();
        tracing::debug!("executor released");
        Ok(())
    }

    pub fn state(&self) -> ExecutorState {
        self.lock().state
    }

    /// Tasks registered for the next run.
    pub fn pending_tasks(&self) -> usize {
        self.lock().batch.task_count()
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    fn begin(&self) -> Result<(Vec<Task>, u64), ExecutorError> {
        let mut inner = self.lock();
        match inner.state {
            ExecutorState::Idle => {}
            ExecutorState::Running => return Err(ConsistencyError::AlreadyRunning.into()),
            ExecutorState::Released => return Err(ConsistencyError::Released.into()),
        }

        let stale = self.errors.drain_all();
        if !stale.is_empty() {
            tracing::error!(
                stale = stale.len(),
                "error channel was not empty at batch start; refusing to run"
            );
            return Err(ConsistencyError::PendingErrors { count: stale.len() }.into());
        }

        inner.state = ExecutorState::Running;
        inner.batches_started += 1;
        Ok((inner.batch.drain_tasks(), inner.batches_started))
    }

    fn execute(&self, tasks: Vec<Task>) -> Result<BatchSummary, ExecutorError> {
        let total = tasks.len();
        let started = Instant::now();
        tracing::info!(
            tasks = total,
            workers = self.pool.worker_count(),
            "starting batch"
        );

        let mut progress = ProgressReporter::new(
            total as u64,
            self.config.show_progress(),
            self.config.progress_refresh_hz(),
        );
        let completions = self
            .pool
            .submit_unordered(tasks, &self.errors)
            .map_err(ExecutorError::Pool)?;

        for completion in completions {
            progress.advance(1);
            tracing::trace!(
                task = %completion.task_id,
                worker = completion.worker_id,
                elapsed_ms = completion.elapsed.as_millis() as u64,
                "task completed"
            );
        }

        let completed = progress.finish() as usize;
        if completed != total {
            return Err(ConsistencyError::LostCompletions {
                expected: total,
                received: completed,
            }
            .into());
        }

        let failures = self.errors.drain_all();
        let summary = BatchSummary {
            total,
            completed,
            failed: failures.len(),
            elapsed: started.elapsed(),
        };

        if failures.is_empty() {
            self.telemetry.record_batch_completed();
            tracing::info!(
                tasks = total,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "batch completed"
            );
            return Ok(summary);
        }

        self.telemetry.record_batch_failed();
        tracing::warn!(
            tasks = total,
            failed = summary.failed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "batch finished with task failures"
        );
        Err(AggregatedFailure::new(failures, summary).into())
    }

    // Every critical section leaves the state consistent, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, ExecutorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the executor to `Idle` with an empty batch on every exit path of a run.
struct CycleGuard<'a> {
    executor: &'a BatchExecutor,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.executor.lock();
        inner.batch.clear();
        inner.state = ExecutorState::Idle;
    }
}
