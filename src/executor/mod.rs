//! Test execution engine
//!
//! Runs test files as PHPUnit processes across a pool of workers, each with
//! its own database.

mod parallel;
mod progress;
mod runner;

pub use parallel::Dispatcher;
pub use progress::{LogSink, ProgressBarSink, ProgressSink};
pub use runner::{phpunit_available, ProcessRunner, RunnerConfig, DEFAULT_DB_PREFIX};
