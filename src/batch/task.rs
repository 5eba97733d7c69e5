use anyhow::Error as AnyError;
use std::fmt;

/// Position of a task inside the batch it was registered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(usize);

impl TaskId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) type TaskCall = Box<dyn FnOnce() -> Result<(), AnyError> + Send + 'static>;

/// A callable bound to the arguments it was registered with.
pub struct Task {
    id: TaskId,
    call: TaskCall,
}

impl Task {
    pub(crate) fn new(id: TaskId, call: TaskCall) -> Self {
        Self { id, call }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn run(self) -> Result<(), AnyError> {
        (self.call)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish_non_exhaustive()
    }
}

/// How a task failed inside its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The callable returned an error.
    Error,
    /// The callable panicked; the panic was contained by the worker.
    Panic,
}

/// A task error captured by a worker and parked on the batch's error channel.
#[derive(Debug)]
pub struct TaskFailure {
    task_id: TaskId,
    worker_id: usize,
    kind: FailureKind,
    error: AnyError,
}

impl TaskFailure {
    pub(crate) fn errored(task_id: TaskId, worker_id: usize, error: AnyError) -> Self {
        Self {
            task_id,
            worker_id,
            kind: FailureKind::Error,
            error,
        }
    }

    pub(crate) fn panicked(task_id: TaskId, worker_id: usize, message: String) -> Self {
        Self {
            task_id,
            worker_id,
            kind: FailureKind::Panic,
            error: AnyError::msg(message),
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn error(&self) -> &AnyError {
        &self.error
    }

    pub fn into_error(self) -> AnyError {
        self.error
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FailureKind::Error => write!(f, "task {} failed: {:#}", self.task_id, self.error),
            FailureKind::Panic => write!(f, "task {} panicked: {}", self.task_id, self.error),
        }
    }
}

impl std::error::Error for TaskFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error.as_ref())
    }
}
