//! Run batches of independent, blocking jobs on a fixed pool of worker threads.
//!
//! Register any number of invocations, call [`BatchExecutor::run`], and get either a
//! summary or one [`AggregatedFailure`] listing every task that failed. A failing task
//! never stops the rest of the batch.
//!
//! ```no_run
//! use batchpool::BatchExecutor;
//!
//! # fn main() -> Result<(), batchpool::ExecutorError> {
//! let executor = BatchExecutor::new(true)?;
//! executor.register(
//!     |(name, size): (&'static str, u64)| -> anyhow::Result<()> {
//!         anyhow::ensure!(size > 0, "{name} is empty");
//!         Ok(())
//!     },
//!     [("a.bin", 10), ("b.bin", 0)],
//! )?;
//!
//! if let Err(err) = executor.run() {
//!     eprintln!("{err}");
//! }
//! executor.release()?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod channel;
pub mod pool;
pub mod runtime;

pub use batch::{ErrorChannel, FailureKind, Task, TaskBatch, TaskFailure, TaskId};
pub use channel::CrossWorkerChannel;
pub use pool::{Completion, Completions, WorkerPool, WorkerPoolParams};
pub use runtime::config::{ExecutorConfig, ExecutorConfigBuilder, ExecutorConfigParams};
pub use runtime::executor::{BatchExecutor, ExecutorState};
pub use runtime::failure::{AggregatedFailure, BatchSummary, ConsistencyError, ExecutorError};
pub use runtime::progress::ProgressReporter;
pub use runtime::telemetry::{
    init_tracing, init_tracing_with, Telemetry, TelemetrySnapshot, DEFAULT_LOG_DIRECTIVE,
};
