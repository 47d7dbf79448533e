//! Unit and run result models
//!
//! A unit is one schedulable test file, optionally narrowed to a single
//! test case. Every processed unit produces exactly one `RunResult`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One schedulable test file
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    /// Path to the test file, as handed to the test binary
    pub path: PathBuf,
    /// Restrict execution to a single test case
    pub case_filter: Option<String>,
}

impl Unit {
    /// Unit covering a whole test file
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            case_filter: None,
        }
    }

    /// Unit narrowed to one test case of a file
    pub fn case(path: impl Into<PathBuf>, case: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            case_filter: Some(case.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path rendered with forward slashes
    pub fn display_path(&self) -> String {
        self.path.to_string_lossy().replace('\\', "/")
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_path())?;
        if let Some(case) = &self.case_filter {
            write!(f, " --filter {case}")?;
        }
        Ok(())
    }
}

/// Outcome of running one unit as an external process
///
/// `success` mirrors the process exit status only. It can disagree with
/// what the parser later finds in `output`.
#[derive(Clone, Debug)]
pub struct RunResult {
    pub unit: Unit,
    pub success: bool,
    /// Combined stdout and stderr, verbatim
    pub output: String,
    /// Set when the process could not be spawned or waited on
    pub process_error: Option<String>,
    pub duration: Duration,
}

impl RunResult {
    /// Result of a process that ran to completion
    pub fn completed(unit: Unit, success: bool, output: String, duration: Duration) -> Self {
        Self {
            unit,
            success,
            output,
            process_error: None,
            duration,
        }
    }

    /// Result of a process that never started
    pub fn spawn_failed(unit: Unit, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            unit,
            success: false,
            output: String::new(),
            process_error: Some(error.into()),
            duration,
        }
    }

    pub fn with_process_error(mut self, error: impl Into<String>) -> Self {
        self.process_error = Some(error.into());
        self
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = if self.success { "✓" } else { "✗" };
        write!(f, "{} {} [{}ms]", symbol, self.unit, self.duration_ms())?;
        if let Some(err) = &self.process_error {
            write!(f, " - {err}")?;
        }
        Ok(())
    }
}
