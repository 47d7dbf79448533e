//! Progress reporting
//!
//! The dispatcher reports every completed unit to an optional sink. Calls
//! are serialized by the dispatcher, so implementations need no locking of
//! their own beyond being `Send + Sync`.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::{debug, info};

/// Observer of dispatch progress
pub trait ProgressSink: Send + Sync {
    /// Called after every unit completion.
    ///
    /// `completed` never decreases within one run.
    fn update(&self, completed: usize, passed: usize, failed: usize);

    /// Called exactly once after the pool drains
    fn finish(&self);
}

/// Terminal progress bar on stderr
pub struct ProgressBarSink {
    bar: ProgressBar,
    label: String,
}

impl ProgressBarSink {
    /// `case_count` of zero labels the bar with the file count instead
    pub fn new(file_count: usize, case_count: usize) -> Self {
        let label = if case_count > 0 {
            format!("{case_count} test cases")
        } else {
            format!("{file_count} files")
        };

        let style = ProgressStyle::with_template("{msg} │{bar:50.cyan}│ {pos}/{len} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("██░");

        let bar = ProgressBar::with_draw_target(
            Some(file_count as u64),
            ProgressDrawTarget::stderr(),
        )
        .with_style(style);

        let sink = Self { bar, label };
        sink.bar.set_message(sink.describe(0, 0));
        sink
    }

    fn describe(&self, passed: usize, failed: usize) -> String {
        format!(
            "Running tests ({}): [success: {} | failed: {}]",
            self.label, passed, failed
        )
    }
}

impl ProgressSink for ProgressBarSink {
    fn update(&self, completed: usize, passed: usize, failed: usize) {
        self.bar.set_position(completed as u64);
        self.bar.set_message(self.describe(passed, failed));
    }

    fn finish(&self) {
        self.bar.finish();
    }
}

/// Progress reported through `tracing`, for non-interactive runs
pub struct LogSink {
    total: usize,
}

impl LogSink {
    pub fn new(total: usize) -> Self {
        Self { total }
    }
}

impl ProgressSink for LogSink {
    fn update(&self, completed: usize, passed: usize, failed: usize) {
        debug!(
            "Progress {}/{} files - cases passed: {}, failed: {}",
            completed, self.total, passed, failed
        );
    }

    fn finish(&self) {
        info!("All {} files dispatched", self.total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar_label() {
        let sink = ProgressBarSink::new(10, 0);
        assert_eq!(
            sink.describe(3, 1),
            "Running tests (10 files): [success: 3 | failed: 1]"
        );

        let sink = ProgressBarSink::new(10, 42);
        assert_eq!(
            sink.describe(0, 0),
            "Running tests (42 test cases): [success: 0 | failed: 0]"
        );
    }

    #[test]
    fn test_progress_bar_updates_position() {
        let sink = ProgressBarSink::new(4, 0);
        sink.update(2, 5, 1);
        assert_eq!(sink.bar.position(), 2);
        sink.finish();
        assert!(sink.bar.is_finished());
    }
}
