use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fmt;
use std::time::Duration;

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} tasks ({per_sec}) ETA {eta_precise}";

/// Counts completion signals for one batch and optionally draws them as a bar on stderr.
pub struct ProgressReporter {
    bar: Option<ProgressBar>,
    total: u64,
    advanced: u64,
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("rendering", &self.bar.is_some())
            .field("total", &self.total)
            .field("advanced", &self.advanced)
            .finish()
    }
}

impl ProgressReporter {
    /// A batch with nothing to do never draws, even when rendering is enabled.
    pub fn new(total: u64, enabled: bool, refresh_hz: u8) -> Self {
        let bar = (enabled && total > 0).then(|| build_progress_bar(total, refresh_hz));
        Self {
            bar,
            total,
            advanced: 0,
        }
    }

    pub fn hidden(total: u64) -> Self {
        Self::new(total, false, 1)
    }

    pub fn advance(&mut self, n: u64) {
        self.advanced = self.advanced.saturating_add(n);
        if let Some(bar) = &self.bar {
            bar.inc(n);
        }
    }

    /// Closes the bar and returns how many units were advanced.
    pub fn finish(self) -> u64 {
        if let Some(bar) = &self.bar {
            bar.finish();
        }
        self.advanced
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn advanced(&self) -> u64 {
        self.advanced
    }

    pub fn is_rendering(&self) -> bool {
        self.bar.is_some()
    }
}

fn build_progress_bar(total: u64, refresh_hz: u8) -> ProgressBar {
    let bar = ProgressBar::with_draw_target(
        Some(total),
        ProgressDrawTarget::stderr_with_hz(refresh_hz.max(1)),
    );
    let style = ProgressStyle::with_template(PROGRESS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}
