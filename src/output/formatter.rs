//! Post-run report formatting
//!
//! Renders the run summary as a table, the parsed failures as a tree keyed
//! by test file, and failed runs that produced no parsable failure.

use std::collections::BTreeMap;

use crate::models::{Failure, RunResult, RunSummary};

/// Lines of raw output shown for a failure the parser could not explain
const ANOMALY_HEAD_LINES: usize = 8;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Formatter for run summaries and failure reports
pub struct SummaryFormatter {
    colorize: bool,
}

impl SummaryFormatter {
    pub fn new() -> Self {
        Self { colorize: true }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// ANSI colour only when the destination is a terminal
    pub fn for_terminal(is_terminal: bool) -> Self {
        if is_terminal {
            Self::new()
        } else {
            Self::new().no_color()
        }
    }

    fn paint(&self, color: &str, text: impl AsRef<str>) -> String {
        if self.colorize {
            format!("{color}{}{RESET}", text.as_ref())
        } else {
            text.as_ref().to_string()
        }
    }

    /// Format the summary table and the closing verdict line
    pub fn format_summary(&self, summary: &RunSummary) -> String {
        let mut output = String::new();

        output.push_str(&self.paint(
            CYAN,
            "\n╔═══════════════════════════════════════════════════════════════╗\n\
             ║                    Test Execution Statistics                  ║\n\
             ╚═══════════════════════════════════════════════════════════════╝",
        ));
        output.push('\n');

        let rows = [
            ("Total Test Files", summary.total_test_files.to_string(), None),
            ("Passed Test Files", summary.passed_test_files.to_string(), Some(GREEN)),
            ("Failed Test Files", summary.failed_test_files.to_string(), Some(RED)),
            ("Failed Test Cases", summary.failed_test_cases.to_string(), Some(RED)),
            ("Pass Rate", format!("{:.1}%", summary.pass_rate()), None),
            ("Duration", summary.duration.clone(), None),
            ("Workers", summary.workers.to_string(), None),
            (
                "Timestamp",
                summary.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                None,
            ),
        ];

        output.push_str("┌─────────────────────────────────┬─────────────────────────────┐\n");
        for (i, (label, value, color)) in rows.iter().enumerate() {
            if i > 0 {
                output.push_str("├─────────────────────────────────┼─────────────────────────────┤\n");
            }
            let cell = format!("{value:<27}");
            let cell = match color {
                Some(color) => self.paint(color, cell),
                None => cell,
            };
            output.push_str(&format!("│ {label:<31} │ {cell} │\n"));
        }
        output.push_str("└─────────────────────────────────┴─────────────────────────────┘\n\n");

        if summary.is_all_passed() {
            output.push_str(&self.paint(GREEN, "✓ All tests passed!"));
        } else {
            output.push_str(&self.paint(
                RED,
                format!(
                    "✗ {} test file(s) failed with {} test case failure(s)",
                    summary.failed_test_files, summary.failed_test_cases
                ),
            ));
        }
        output.push('\n');

        output
    }

    /// Format failures grouped by file, one tree branch per path segment
    pub fn format_failures(&self, failures: &[Failure]) -> String {
        let mut by_file: BTreeMap<&str, Vec<&Failure>> = BTreeMap::new();
        for failure in failures {
            by_file
                .entry(failure.file_path.trim_start_matches("./"))
                .or_default()
                .push(failure);
        }

        let mut output = String::new();
        let mut previous: Vec<&str> = Vec::new();

        for (file, file_failures) in by_file {
            let parts: Vec<&str> = file.split('/').filter(|p| !p.is_empty()).collect();
            let Some((name, dirs)) = parts.split_last() else {
                continue;
            };

            // Print only the directory segments not shared with the previous file
            let shared = dirs
                .iter()
                .zip(previous.iter())
                .take_while(|(a, b)| a == b)
                .count();
            for (depth, dir) in dirs.iter().enumerate().skip(shared) {
                output.push_str(&format!("{}{}\n", indent(depth), self.paint(CYAN, dir)));
            }
            output.push_str(&format!(
                "{}{}\n",
                indent(dirs.len()),
                self.paint(YELLOW, name)
            ));

            for failure in file_failures {
                let pad = "  ".repeat(dirs.len() + 1);
                output.push_str(&format!(
                    "{pad}{} {}\n",
                    self.paint(RED, "✗"),
                    failure.test_name
                ));
                if let Some(first) = failure.message.lines().next() {
                    output.push_str(&format!("{pad}    {first}\n"));
                }
                if let Some(location) = failure.location() {
                    output.push_str(&format!("{pad}    at {location}\n"));
                }
            }

            previous = dirs.to_vec();
        }

        output
    }

    /// Format failed runs whose output yielded no failure record
    pub fn format_anomalies(&self, unparsed: &[&RunResult]) -> String {
        if unparsed.is_empty() {
            return String::new();
        }

        let mut output = self.paint(
            YELLOW,
            format!("⚠ {} failed file(s) without a parsable failure:", unparsed.len()),
        );
        output.push('\n');

        for result in unparsed {
            output.push_str(&format!("  {}\n", result.unit));
            if let Some(error) = &result.process_error {
                output.push_str(&format!("    process: {error}\n"));
            }
            for line in result
                .output
                .lines()
                .filter(|l| !l.trim().is_empty())
                .take(ANOMALY_HEAD_LINES)
            {
                output.push_str(&format!("    | {line}\n"));
            }
        }

        output
    }
}

impl Default for SummaryFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn indent(depth: usize) -> String {
    if depth == 0 {
        String::new()
    } else {
        format!("{}|_ ", "  ".repeat(depth))
    }
}
