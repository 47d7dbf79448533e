//! Structured failure records extracted from test output

use serde::{Deserialize, Serialize};
use std::fmt;

/// One failing test case reported inside a run's output
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Test method name, including any data set suffix
    pub test_name: String,
    /// Reported file path, derived from the qualified class name
    pub file_path: String,
    pub message: String,
    /// Brace-balanced diagnostic block, stored verbatim
    #[serde(rename = "error_details")]
    pub structured_detail: String,
    pub stack_trace: Vec<String>,
    /// First stack frame inside the test tree
    #[serde(rename = "file")]
    pub source_file: String,
    #[serde(rename = "line")]
    pub source_line: u32,
    /// Toggled by result browsing tools, never by the runner
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub resolved: bool,
}

impl Failure {
    pub fn new(file_path: impl Into<String>, test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            file_path: file_path.into(),
            ..Default::default()
        }
    }

    /// Whether the failure points at a location in the test tree
    pub fn has_location(&self) -> bool {
        !self.source_file.is_empty()
    }

    /// `file:line` of the failing assertion, if known
    pub fn location(&self) -> Option<String> {
        self.has_location()
            .then(|| format!("{}:{}", self.source_file, self.source_line))
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.file_path, self.test_name)?;
        if let Some(location) = self.location() {
            write!(f, " ({location})")?;
        }
        Ok(())
    }
}
