//! Results storage module
//!
//! Persists the latest run and selects previously failed files.

mod storage;

pub use storage::{select_failed, ExportFormat, ResultsStorage, StoredRun};
