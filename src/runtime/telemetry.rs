use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::OnceLock;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset: batch events at `info`, everything else at `warn`.
pub const DEFAULT_LOG_DIRECTIVE: &str = "batchpool=info,warn";

static TRACING_INIT: OnceLock<bool> = OnceLock::new();

/// Installs a compact fmt subscriber tagged with worker thread names.
///
/// Returns `true` only for the call that actually installed it; later calls, or a
/// subscriber installed elsewhere, leave the global state untouched.
pub fn init_tracing() -> bool {
    init_tracing_with(DEFAULT_LOG_DIRECTIVE)
}

/// Same as [`init_tracing`] with a caller-chosen fallback filter. `RUST_LOG` still wins.
pub fn init_tracing_with(default_directive: &str) -> bool {
    let mut installed = false;
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));
        // Closing the per-batch span logs how long the whole run took.
        installed = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .compact()
            .try_init()
            .is_ok();
        installed
    });
    installed
}

/// Counters shared by the executor and its workers.
#[derive(Default, Debug)]
pub struct Telemetry {
    tasks_submitted: AtomicU64,
    tasks_succeeded: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_panicked: AtomicU64,
    batches_completed: AtomicU64,
    batches_failed: AtomicU64,
    worker_pool_size: AtomicUsize,
}

impl Telemetry {
    pub fn record_task_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_succeeded(&self) {
        self.tasks_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_panicked(&self) {
        self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch_completed(&self) {
        self.batches_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch_failed(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_worker_pool_size(&self, workers: usize) {
        self.worker_pool_size.store(workers, Ordering::Relaxed);
    }

    pub fn worker_pool_size(&self) -> usize {
        self.worker_pool_size.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_succeeded: self.tasks_succeeded.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub tasks_submitted: u64,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    pub tasks_panicked: u64,
    pub batches_completed: u64,
    pub batches_failed: u64,
}

impl TelemetrySnapshot {
    /// Tasks that ended with an error or a panic.
    pub fn task_failures(&self) -> u64 {
        self.tasks_failed.saturating_add(self.tasks_panicked)
    }
}
