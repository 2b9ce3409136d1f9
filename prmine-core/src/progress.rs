//! Progress reporting for the sync loop.
//!
//! The CLI uses `IndicatifReporter` for a live counter; library callers
//! can use `NoopReporter` or provide their own implementation. The total
//! number of pages is unknown up front, so reporting is spinner-style.

use indicatif::{ProgressBar, ProgressStyle};

/// Trait for reporting sync progress.
pub trait ProgressReporter: Send + Sync {
    /// Begin a new task.
    fn start(&self, task: &str);

    /// Advance the item counter by the given amount.
    fn advance(&self, amount: u64);

    /// Mark the current task as finished.
    fn finish(&self);
}

/// No-op reporter for library callers that don't need progress output.
#[derive(Debug, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn start(&self, _task: &str) {}
    fn advance(&self, _amount: u64) {}
    fn finish(&self) {}
}

/// Reporter backed by an `indicatif` spinner for CLI use.
#[derive(Debug)]
pub struct IndicatifReporter {
    bar: ProgressBar,
}

impl IndicatifReporter {
    pub fn new() -> Self {
        Self {
            bar: ProgressBar::new_spinner(),
        }
    }
}

impl Default for IndicatifReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for IndicatifReporter {
    fn start(&self, task: &str) {
        self.bar
            .set_style(
                ProgressStyle::with_template("{spinner:.green} {msg}: {pos} pull requests")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
        self.bar.set_message(task.to_string());
        self.bar.reset();
    }

    fn advance(&self, amount: u64) {
        self.bar.inc(amount);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
