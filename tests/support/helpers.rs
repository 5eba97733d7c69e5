use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use batchpool::{BatchExecutor, ExecutorConfig};
use once_cell::sync::Lazy;
use tracing_subscriber::EnvFilter;

static TRACING_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING_SUBSCRIBER);
}

/// Executor with the given pool size and no progress bar.
pub fn quiet_executor(workers: usize) -> BatchExecutor {
    let config = ExecutorConfig::builder()
        .worker_count(workers)
        .show_progress(false)
        .thread_name_prefix("executor-test")
        .build()
        .expect("test config should be valid");
    BatchExecutor::with_config(config).expect("executor should start")
}

/// Plain error type standing in for whatever a real job would return.
#[derive(Debug)]
pub struct ValueError(pub String);

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueError: {}", self.0)
    }
}

impl std::error::Error for ValueError {}

/// Counts how many times the tasks built from it actually ran.
#[derive(Clone, Default)]
pub struct RunCounter(Arc<AtomicUsize>);

impl RunCounter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
