//! Results storage and retrieval
//!
//! Persists the outcome of the latest run as a single JSON document: the run
//! summary under `meta` and every parsed failure under `details`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::models::{Failure, RunResult, RunSummary};

/// Stored test run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredRun {
    pub meta: RunSummary,
    #[serde(default)]
    pub details: Vec<Failure>,
}

impl StoredRun {
    pub fn new(
        results: &[RunResult],
        failures: Vec<Failure>,
        duration: Duration,
        workers: usize,
    ) -> Self {
        Self {
            meta: RunSummary::from_results(results, &failures, duration, workers),
            details: failures,
        }
    }

    /// Normalized keys of every file with a recorded failure
    pub fn failed_keys(&self, project: &Path) -> HashSet<String> {
        failed_keys(project, &self.details)
    }
}

/// Normalized keys of the files named by `failures`
pub fn failed_keys(project: &Path, failures: &[Failure]) -> HashSet<String> {
    failures
        .iter()
        .map(|f| normalized_key(project, Path::new(&f.file_path)))
        .collect()
}

/// Comparable key for a test file path.
///
/// Relative to `project` when the path lies inside it, forward slashes, no
/// `.php` suffix, lower-cased. A discovered file and the file path reported
/// in a failure (`Tests/Unit/FooTest`) map to the same key.
pub fn normalized_key(project: &Path, path: &Path) -> String {
    let relative = path
        .strip_prefix(project)
        .ok()
        .filter(|rel| !rel.as_os_str().is_empty())
        .unwrap_or(path);

    let mut joined = relative.to_string_lossy().replace('\\', "/");
    while let Some(rest) = joined.strip_prefix("./") {
        joined = rest.to_string();
    }

    let trimmed = joined.strip_suffix(".php").unwrap_or(&joined);
    trimmed.to_lowercase()
}

/// Keep only the paths whose key is in `keys`, preserving order
pub fn select_failed(
    project: &Path,
    paths: Vec<PathBuf>,
    keys: &HashSet<String>,
) -> Vec<PathBuf> {
    paths
        .into_iter()
        .filter(|p| keys.contains(&normalized_key(project, p)))
        .collect()
}

/// Results file manager
pub struct ResultsStorage {
    path: PathBuf,
}

impl ResultsStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Save a run, replacing any previous one
    pub fn save(&self, run: &StoredRun) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = File::create(&self.path).context("Failed to create results file")?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, run).context("Failed to write results")?;

        info!("Saved test results to {}", self.path.display());
        Ok(())
    }

    /// Load the last saved run
    pub fn load(&self) -> Result<StoredRun> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open results file {}", self.path.display()))?;
        let reader = BufReader::new(file);

        let run: StoredRun = serde_json::from_reader(reader).context("Failed to parse results")?;

        debug!("Loaded test results from {}", self.path.display());
        Ok(run)
    }

    /// Load the last run if one was saved
    pub fn load_optional(&self) -> Result<Option<StoredRun>> {
        if !self.exists() {
            return Ok(None);
        }
        self.load().map(Some)
    }

    /// Export a run to a file
    pub fn export(&self, run: &StoredRun, path: &Path, format: ExportFormat) -> Result<()> {
        match format {
            ExportFormat::Json => {
                let file = File::create(path)?;
                let writer = BufWriter::new(file);
                serde_json::to_writer_pretty(writer, run)?;
            }
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_path(path)?;

                writer.write_record([
                    "file_path",
                    "test_name",
                    "message",
                    "file",
                    "line",
                    "resolved",
                ])?;

                for failure in &run.details {
                    writer.write_record([
                        failure.file_path.clone(),
                        failure.test_name.clone(),
                        failure.message.clone(),
                        failure.source_file.clone(),
                        failure.source_line.to_string(),
                        failure.resolved.to_string(),
                    ])?;
                }
                writer.flush()?;
            }
        }

        info!("Exported results to {}", path.display());
        Ok(())
    }
}

/// Export format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }
}
