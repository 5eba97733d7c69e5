use crate::batch::TaskFailure;
use anyhow::Error as AnyError;
use std::fmt;
use std::time::Duration;

/// Accounting for one finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.completed.saturating_sub(self.failed)
    }
}

/// Every task failure of one batch, raised once after all tasks finished.
#[derive(Debug)]
pub struct AggregatedFailure {
    failures: Vec<TaskFailure>,
    summary: BatchSummary,
}

impl AggregatedFailure {
    pub(crate) fn new(failures: Vec<TaskFailure>, summary: BatchSummary) -> Self {
        Self { failures, summary }
    }

    pub fn count(&self) -> usize {
        self.failures.len()
    }

    pub fn failures(&self) -> &[TaskFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<TaskFailure> {
        self.failures
    }

    pub fn summary(&self) -> &BatchSummary {
        &self.summary
    }
}

impl fmt::Display for AggregatedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.failures.len();
        let noun = if count == 1 { "error" } else { "errors" };
        write!(f, "{count} {noun} occurred:")?;
        for failure in &self.failures {
            write!(f, "\nERROR: {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregatedFailure {}

/// Misuse of the executor or a broken internal invariant. Never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyError {
    AlreadyRunning,
    RegisterWhileRunning,
    ReleaseWhileRunning,
    Released,
    PendingErrors { count: usize },
    LostCompletions { expected: usize, received: usize },
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRunning => f.write_str("a batch is already running on this executor"),
            Self::RegisterWhileRunning => f.write_str("cannot register tasks while a batch is running"),
            Self::ReleaseWhileRunning => f.write_str("cannot release the executor while a batch is running"),
            Self::Released => f.write_str("executor has been released"),
            Self::PendingErrors { count } => write!(
                f,
                "error channel holds {count} failures from a previous cycle at batch start"
            ),
            Self::LostCompletions { expected, received } => write!(
                f,
                "worker pool reported {received} of {expected} task completions"
            ),
        }
    }
}

impl std::error::Error for ConsistencyError {}

/// Error returned by [`BatchExecutor`](crate::BatchExecutor) operations.
#[derive(Debug)]
pub enum ExecutorError {
    /// One or more tasks failed; carries all of them.
    Failed(AggregatedFailure),
    Consistency(ConsistencyError),
    /// The supplied configuration was rejected.
    Config(AnyError),
    /// The worker pool itself could not do its job.
    Pool(AnyError),
}

impl ExecutorError {
    pub fn aggregated(&self) -> Option<&AggregatedFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn consistency(&self) -> Option<ConsistencyError> {
        match self {
            Self::Consistency(error) => Some(*error),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(failure) => fmt::Display::fmt(failure, f),
            Self::Consistency(error) => write!(f, "executor consistency error: {error}"),
            Self::Config(error) => write!(f, "invalid executor configuration: {error:#}"),
            Self::Pool(error) => write!(f, "worker pool error: {error:#}"),
        }
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Failed(failure) => Some(failure),
            Self::Consistency(error) => Some(error),
            Self::Config(error) | Self::Pool(error) => Some(error.as_ref()),
        }
    }
}

impl From<AggregatedFailure> for ExecutorError {
    fn from(failure: AggregatedFailure) -> Self {
        Self::Failed(failure)
    }
}

impl From<ConsistencyError> for ExecutorError {
    fn from(error: ConsistencyError) -> Self {
        Self::Consistency(error)
    }
}
