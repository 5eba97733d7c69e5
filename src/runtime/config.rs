use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;
use std::thread;

pub const DEFAULT_THREAD_NAME_PREFIX: &str = "batchpool-worker";
pub const DEFAULT_PROGRESS_REFRESH_HZ: u8 = 12;

pub const WORKERS_ENV: &str = "BATCHPOOL_WORKERS";
pub const SHOW_PROGRESS_ENV: &str = "BATCHPOOL_SHOW_PROGRESS";
pub const PROGRESS_HZ_ENV: &str = "BATCHPOOL_PROGRESS_HZ";

/// Runtime configuration for a [`BatchExecutor`](crate::BatchExecutor).
///
/// All instances must be constructed via [`ExecutorConfig::builder`] or [`ExecutorConfig::new`]
/// so invariants are validated before the pool is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    worker_count: usize,
    show_progress: bool,
    progress_refresh_hz: u8,
    thread_name_prefix: String,
}

pub struct ExecutorConfigParams {
    pub worker_count: usize,
    pub show_progress: bool,
    pub progress_refresh_hz: u8,
    pub thread_name_prefix: String,
}

impl ExecutorConfig {
    pub fn builder() -> ExecutorConfigBuilder {
        ExecutorConfigBuilder::default()
    }

    pub fn new(params: ExecutorConfigParams) -> Result<Self> {
        let ExecutorConfigParams {
            worker_count,
            show_progress,
            progress_refresh_hz,
            thread_name_prefix,
        } = params;

        let config = Self {
            worker_count,
            show_progress,
            progress_refresh_hz,
            thread_name_prefix: thread_name_prefix.trim().to_owned(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `BATCHPOOL_WORKERS`, `BATCHPOOL_SHOW_PROGRESS` and
    /// `BATCHPOOL_PROGRESS_HZ` when they are set.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(workers) = parse_env::<usize>(WORKERS_ENV)? {
            builder = builder.worker_count(workers);
        }
        if let Some(raw) = read_env(SHOW_PROGRESS_ENV) {
            let enabled = parse_flag(&raw)
                .with_context(|| format!("{SHOW_PROGRESS_ENV} has an invalid value"))?;
            builder = builder.show_progress(enabled);
        }
        if let Some(hz) = parse_env::<u8>(PROGRESS_HZ_ENV)? {
            builder = builder.progress_refresh_hz(hz);
        }

        builder.build()
    }

    /// Number of worker threads in the pool.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Whether a progress bar is drawn while a batch runs.
    pub fn show_progress(&self) -> bool {
        self.show_progress
    }

    pub fn progress_refresh_hz(&self) -> u8 {
        self.progress_refresh_hz
    }

    /// Worker threads are named `<prefix>-<worker id>`.
    pub fn thread_name_prefix(&self) -> &str {
        &self.thread_name_prefix
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            bail!("worker_count must be greater than 0");
        }

        if self.progress_refresh_hz == 0 {
            bail!("progress_refresh_hz must be greater than 0");
        }

        if self.thread_name_prefix.is_empty() {
            bail!("thread_name_prefix cannot be empty");
        }

        if self.thread_name_prefix.contains('\0') {
            bail!("thread_name_prefix cannot contain NUL bytes");
        }

        Ok(())
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            show_progress: true,
            progress_refresh_hz: DEFAULT_PROGRESS_REFRESH_HZ,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_owned(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ExecutorConfigBuilder {
    worker_count: Option<usize>,
    show_progress: Option<bool>,
    progress_refresh_hz: Option<u8>,
    thread_name_prefix: Option<String>,
}

impl ExecutorConfigBuilder {
    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = Some(count);
        self
    }

    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.show_progress = Some(enabled);
        self
    }

    pub fn progress_refresh_hz(mut self, hz: u8) -> Self {
        self.progress_refresh_hz = Some(hz);
        self
    }

    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = Some(prefix.into());
        self
    }

    pub fn build(self) -> Result<ExecutorConfig> {
        let params = ExecutorConfigParams {
            worker_count: self.worker_count.unwrap_or_else(default_worker_count),
            show_progress: self.show_progress.unwrap_or(true),
            progress_refresh_hz: self
                .progress_refresh_hz
                .unwrap_or(DEFAULT_PROGRESS_REFRESH_HZ),
            thread_name_prefix: self
                .thread_name_prefix
                .unwrap_or_else(|| DEFAULT_THREAD_NAME_PREFIX.to_owned()),
        };

        ExecutorConfig::new(params)
    }
}

/// Host parallelism, or a single worker when it cannot be determined.
pub fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    read_env(key)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("{key} has an invalid value: {raw}"))
        })
        .transpose()
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean flag, got {other:?}"),
    }
}
