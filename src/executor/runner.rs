//! Test execution runner
//!
//! Runs a single test file as an external PHPUnit process.

use async_trait::async_trait;
use std::io::{self, PipeReader, Read};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::{Child, Command};
use tokio::task;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{RunResult, Unit};

/// Environment variable carrying the worker's database name
pub const DATABASE_ENV: &str = "DB_DATABASE";

/// Default prefix for per-worker database names
pub const DEFAULT_DB_PREFIX: &str = "testing";

/// Executes one unit on behalf of a worker
#[async_trait]
pub trait UnitRunner: Send + Sync {
    /// Run `unit` with the isolated resources of `worker_id`.
    ///
    /// Never fails: spawn errors are reported inside the returned result.
    async fn run(&self, unit: &Unit, worker_id: usize) -> RunResult;
}

/// Settings for spawning PHPUnit
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Working directory of every test process
    pub project_path: PathBuf,
    /// Explicit PHPUnit binary; defaults to `vendor/bin/phpunit`
    pub phpunit_path: Option<PathBuf>,
    /// Prefix of the per-worker database name
    pub db_prefix: String,
}

impl RunnerConfig {
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            phpunit_path: None,
            db_prefix: DEFAULT_DB_PREFIX.to_string(),
        }
    }

    pub fn with_phpunit_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.phpunit_path = Some(path.into());
        self
    }

    pub fn with_db_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.db_prefix = prefix.into();
        self
    }

    /// Resolved PHPUnit binary
    pub fn phpunit_path(&self) -> PathBuf {
        self.phpunit_path
            .clone()
            .unwrap_or_else(|| self.project_path.join("vendor").join("bin").join("phpunit"))
    }

    /// Database name reserved for a worker, e.g. `testing_3`
    pub fn database_name(&self, worker_id: usize) -> String {
        format!("{}_{}", self.db_prefix, worker_id)
    }
}

/// Runs units as PHPUnit child processes
pub struct ProcessRunner {
    config: RunnerConfig,
}

impl ProcessRunner {
    /// Create a runner, rejecting configurations that cannot work
    pub fn new(config: RunnerConfig) -> Result<Self> {
        if !config.project_path.is_dir() {
            return Err(Error::Config(format!(
                "project path is not a directory: {}",
                config.project_path.display()
            )));
        }
        if config.db_prefix.trim().is_empty() {
            return Err(Error::Config("database prefix must not be empty".into()));
        }
        Ok(Self { config })
    }

    fn command(&self, unit: &Unit, worker_id: usize) -> Command {
        let mut cmd = Command::new(self.config.phpunit_path());
        if let Some(case) = &unit.case_filter {
            cmd.arg("--filter").arg(case);
        }
        cmd.arg(unit.path())
            .current_dir(&self.config.project_path)
            .env(DATABASE_ENV, self.config.database_name(worker_id))
            .stdin(Stdio::null());
        cmd
    }

    /// Spawn with stdout and stderr sharing one pipe; the reader sees the
    /// bytes in the order the process wrote them.
    fn spawn_combined(&self, unit: &Unit, worker_id: usize) -> io::Result<(Child, PipeReader)> {
        let (reader, writer) = io::pipe()?;
        let stderr = writer.try_clone()?;

        let mut cmd = self.command(unit, worker_id);
        cmd.stdout(writer).stderr(stderr);
        let child = cmd.spawn()?;
        // Release the parent's write ends or the reader never sees EOF
        drop(cmd);

        Ok((child, reader))
    }
}

#[async_trait]
impl UnitRunner for ProcessRunner {
    async fn run(&self, unit: &Unit, worker_id: usize) -> RunResult {
        debug!("Worker {} running {}", worker_id, unit);
        let start = Instant::now();

        let (mut child, mut reader) = match self.spawn_combined(unit, worker_id) {
            Ok(spawned) => spawned,
            Err(e) => {
                warn!(
                    "Failed to start {} for {}: {}",
                    self.config.phpunit_path().display(),
                    unit,
                    e
                );
                return RunResult::spawn_failed(unit.clone(), e.to_string(), start.elapsed());
            }
        };

        let capture = task::spawn_blocking(move || {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).map(|_| buf)
        });

        let status = child.wait().await;
        let bytes = match capture.await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                warn!("Failed to read output of {}: {}", unit, e);
                Vec::new()
            }
            Err(e) => {
                warn!("Output reader for {} did not finish: {}", unit, e);
                Vec::new()
            }
        };
        let text = String::from_utf8_lossy(&bytes).into_owned();

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                warn!("Failed to wait for {}: {}", unit, e);
                return RunResult::completed(unit.clone(), false, text, start.elapsed())
                    .with_process_error(e.to_string());
            }
        };

        let success = status.success();
        let result = RunResult::completed(unit.clone(), success, text, start.elapsed());
        debug!("Worker {} finished {}", worker_id, result);

        if success {
            result
        } else {
            match status.code() {
                Some(code) => result.with_process_error(format!("exit status {code}")),
                None => result.with_process_error("terminated by signal"),
            }
        }
    }
}

/// Whether the configured PHPUnit binary exists
pub fn phpunit_available(config: &RunnerConfig) -> bool {
    config.phpunit_path().is_file()
}
