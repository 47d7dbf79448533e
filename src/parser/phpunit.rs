//! PHPUnit output parser
//!
//! PHPUnit writes every failing test of a file into one text stream. The
//! only reliable delimiter is the qualified test name line, e.g.
//! `1) Tests\Unit\UserTest::testCreate`, which we call the anchor.
//!
//! Each anchor block is read in three ordered phases:
//!
//! 1. message lines, up to a line that is exactly `{`
//! 2. a brace-balanced diagnostic block, kept verbatim
//! 3. stack frames of the form `<path>:<line>`

use regex::{Regex, RegexBuilder};
use std::path::{Component, Path};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::models::{Failure, RunResult};

/// Default marker identifying frames inside the project's test tree
pub const DEFAULT_TEST_ROOT: &str = "tests/";

/// Separator between class name and method name in anchor lines
const QUALIFIER: &str = "::";

static ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\)\s*").expect("ordinal regex is valid"));

static STACK_FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<path>\S.*\.\w+):(?P<line>\d+)$").expect("stack frame regex is valid")
});

static OK_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"OK \((?P<total>\d+) tests?, \d+ assertions?\)").expect("OK summary regex is valid")
});

static TESTS_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Tests:\s*(?P<total>\d+),\s*Assertions:\s*\d+").expect("tests summary regex is valid")
});

static FAILURES_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Failures:\s*(\d+)").expect("failures regex is valid"));

static ERRORS_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Errors:\s*(\d+)").expect("errors regex is valid"));

/// Scan phase inside one anchor block
#[derive(Clone, Copy)]
enum Phase {
    Message,
    Detail { depth: i64 },
    StackTrace,
}

/// Extracts structured failures and case counts from PHPUnit output
#[derive(Clone, Debug)]
pub struct PhpUnitParser {
    test_root: String,
}

impl PhpUnitParser {
    pub fn new() -> Self {
        Self {
            test_root: DEFAULT_TEST_ROOT.to_string(),
        }
    }

    /// Override the marker used to pick the canonical source frame
    pub fn with_test_root(mut self, marker: impl Into<String>) -> Self {
        self.test_root = marker.into();
        self
    }

    /// Extract one `Failure` per anchor block in the result's output.
    ///
    /// Blocks are returned in scan order. Data provider runs of the same
    /// method produce separate blocks and are never merged.
    pub fn parse_failures(&self, result: &RunResult) -> Vec<Failure> {
        let Some(anchor) = anchor_for(&result.unit.path) else {
            return Vec::new();
        };

        let lines: Vec<&str> = result.output.lines().collect();
        let starts: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| anchor.is_match(line))
            .map(|(i, _)| i)
            .collect();

        let failures: Vec<Failure> = starts
            .iter()
            .enumerate()
            .map(|(n, &start)| {
                let end = starts.get(n + 1).copied().unwrap_or(lines.len());
                self.parse_block(lines[start], &anchor, &lines[start + 1..end])
            })
            .collect();

        if failures.is_empty() && !result.success {
            debug!(
                "No failure blocks found in output of {}",
                result.unit.display_path()
            );
        }

        failures
    }

    /// Derive `(passed, failed)` test case counts from the run summary line.
    ///
    /// Output without a recognizable summary counts as one passed or one
    /// failed case, so progress always advances.
    pub fn parse_case_counts(&self, result: &RunResult) -> (usize, usize) {
        if let Some(total) = OK_SUMMARY
            .captures(&result.output)
            .and_then(|caps| caps["total"].parse::<usize>().ok())
        {
            return (total, 0);
        }

        for line in result.output.lines() {
            let Some(caps) = TESTS_SUMMARY.captures(line) else {
                continue;
            };
            let Ok(total) = caps["total"].parse::<usize>() else {
                continue;
            };
            let failed = count_in(&FAILURES_COUNT, line) + count_in(&ERRORS_COUNT, line);
            return (total.saturating_sub(failed), failed);
        }

        if result.success {
            (1, 0)
        } else {
            (0, 1)
        }
    }

    fn parse_block(&self, anchor_line: &str, anchor: &Regex, body: &[&str]) -> Failure {
        let (file_path, test_name) = split_anchor_line(anchor_line, anchor);
        let mut failure = Failure::new(file_path, test_name);

        let mut message: Vec<&str> = Vec::new();
        let mut detail: Vec<&str> = Vec::new();
        let mut phase = Phase::Message;

        for &line in body {
            let trimmed = line.trim();

            match phase {
                Phase::Message => {
                    if trimmed == "{" {
                        detail.push(line);
                        phase = Phase::Detail { depth: 1 };
                    } else if !(message.is_empty() && trimmed.is_empty()) {
                        message.push(line);
                    }
                }
                Phase::Detail { depth } => {
                    detail.push(line);
                    let depth = depth + brace_balance(line);
                    phase = if depth <= 0 {
                        Phase::StackTrace
                    } else {
                        Phase::Detail { depth }
                    };
                }
                Phase::StackTrace => self.collect_frame(&mut failure, trimmed),
            }
        }

        if matches!(phase, Phase::Detail { .. }) {
            warn!(
                "Unterminated diagnostic block for {}::{}",
                failure.file_path, failure.test_name
            );
        }

        while message.last().is_some_and(|l| l.trim().is_empty()) {
            message.pop();
        }
        failure.message = message.join("\n");
        failure.structured_detail = detail.join("\n");
        failure
    }

    fn collect_frame(&self, failure: &mut Failure, line: &str) {
        let Some(caps) = STACK_FRAME.captures(line) else {
            return;
        };
        let path = &caps["path"];
        let in_tests = path.contains(&self.test_root);
        if !(in_tests || path.starts_with('/') || Path::new(path).is_absolute()) {
            return;
        }

        failure.stack_trace.push(line.to_string());
        if in_tests && failure.source_file.is_empty() {
            failure.source_file = path.to_string();
            failure.source_line = caps["line"].parse().unwrap_or(0);
        }
    }
}

impl Default for PhpUnitParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the case-insensitive anchor for a test file path.
///
/// `tests/Unit/UserTest.php` becomes `tests\Unit\UserTest::`.
fn anchor_for(path: &Path) -> Option<Regex> {
    let qualified = qualified_name(path);
    if qualified.is_empty() {
        return None;
    }

    let pattern = regex::escape(&format!("{qualified}{QUALIFIER}"));
    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Could not build anchor for {}: {}", path.display(), e);
            None
        }
    }
}

/// Path without extension or leading `./`, joined with backslashes
fn qualified_name(path: &Path) -> String {
    path.with_extension("")
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("\\")
}

/// Split `N) Some\Class::method` into (`Some/Class`, `method`)
fn split_anchor_line(line: &str, anchor: &Regex) -> (String, String) {
    let (head, name) = match anchor.find(line) {
        Some(m) => (&line[..m.end() - QUALIFIER.len()], &line[m.end()..]),
        None => line.split_once(QUALIFIER).unwrap_or((line, "")),
    };

    let head = ORDINAL.replace(head, "");
    let file_path = head.trim().replace('\\', "/");
    (file_path, name.trim().to_string())
}

fn brace_balance(line: &str) -> i64 {
    line.chars().fold(0, |acc, c| match c {
        '{' => acc + 1,
        '}' => acc - 1,
        _ => acc,
    })
}

fn count_in(re: &Regex, line: &str) -> usize {
    re.captures(line)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}
