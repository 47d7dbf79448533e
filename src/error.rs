//! Error types
//!
//! Failures of individual test files are data (`RunResult`), never errors.
//! This enum covers misconfiguration and infrastructure faults only.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the execution core and its collaborators
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Test path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Test path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Worker task failed: {0}")]
    WorkerPanicked(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
