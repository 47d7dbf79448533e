//! Output formatting module
//!
//! Terminal reports for completed runs.

mod formatter;

pub use formatter::SummaryFormatter;
