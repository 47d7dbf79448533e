//! Run summary model
//!
//! Aggregate numbers for one dispatch, derived after the pool drains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::{Failure, RunResult};

/// Summary of a complete test run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_test_files: usize,
    pub passed_test_files: usize,
    pub failed_test_files: usize,
    pub failed_test_cases: usize,
    /// Human readable wall-clock duration
    pub duration: String,
    pub duration_seconds: f64,
    pub workers: usize,
    pub timestamp: DateTime<Utc>,
}

impl RunSummary {
    pub fn from_results(
        results: &[RunResult],
        failures: &[Failure],
        duration: Duration,
        workers: usize,
    ) -> Self {
        let passed = results.iter().filter(|r| r.success).count();

        Self {
            total_test_files: results.len(),
            passed_test_files: passed,
            failed_test_files: results.len() - passed,
            failed_test_cases: failures.len(),
            duration: format_duration(duration),
            duration_seconds: duration.as_secs_f64(),
            workers,
            timestamp: Utc::now(),
        }
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total_test_files == 0 {
            0.0
        } else {
            (self.passed_test_files as f64 / self.total_test_files as f64) * 100.0
        }
    }

    pub fn is_all_passed(&self) -> bool {
        self.failed_test_files == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Files: {} | Pass: {} | Fail: {} | Failed cases: {} | Workers: {} | Duration: {}",
            self.total_test_files,
            self.passed_test_files,
            self.failed_test_files,
            self.failed_test_cases,
            self.workers,
            self.duration
        )
    }
}

/// Format a duration as `1m 02.345s` or `2.345s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs >= 60.0 {
        let minutes = (secs / 60.0).floor();
        format!("{}m {:06.3}s", minutes as u64, secs - minutes * 60.0)
    } else {
        format!("{secs:.3}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Unit;

    fn result(path: &str, success: bool) -> RunResult {
        RunResult::completed(Unit::file(path), success, String::new(), Duration::ZERO)
    }

    #[test]
    fn test_summary_counts() {
        let results = vec![
            result("tests/ATest.php", true),
            result("tests/BTest.php", false),
            result("tests/CTest.php", true),
        ];
        let failures = vec![
            Failure::new("tests/BTest", "testOne"),
            Failure::new("tests/BTest", "testTwo"),
        ];

        let summary = RunSummary::from_results(&results, &failures, Duration::from_secs(3), 4);
        assert_eq!(summary.total_test_files, 3);
        assert_eq!(summary.passed_test_files, 2);
        assert_eq!(summary.failed_test_files, 1);
        assert_eq!(summary.failed_test_cases, 2);
        assert_eq!(summary.workers, 4);
        assert!(!summary.is_all_passed());
    }

    #[test]
    fn test_empty_summary() {
        let summary = RunSummary::from_results(&[], &[], Duration::ZERO, 1);
        assert_eq!(summary.pass_rate(), 0.0);
        assert!(summary.is_all_passed());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(2345)), "2.345s");
        assert_eq!(format_duration(Duration::from_millis(62_345)), "1m 02.345s");
    }
}
