//! Data models for parallel test execution
//!
//! This module contains all data structures used throughout the application.

mod failure;
mod summary;
mod unit;

pub use failure::Failure;
pub use summary::RunSummary;
pub use unit::{RunResult, Unit};
