//! Configuration module
//!
//! Settings are layered: built-in defaults, then a config file, then `PTP_*`
//! environment variables, then command line flags.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig, ENV_PREFIX};
pub use file::ConfigFile;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::discovery::DEFAULT_SKIP_DIRS;
use crate::executor::{RunnerConfig, DEFAULT_DB_PREFIX};
use crate::parser::{PhpUnitParser, DEFAULT_TEST_ROOT};

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Laravel/PHP project root; working directory of every test process
    pub project_path: PathBuf,

    /// Directory scanned for tests, relative to the project unless absolute
    pub test_path: PathBuf,

    /// Number of parallel workers
    pub processors: usize,

    /// Results directory, relative to the project
    pub output_dir: PathBuf,

    /// Results file name
    pub output_file: String,

    /// Prefix of the per-worker database name
    pub db_prefix: String,

    /// PHPUnit binary, `vendor/bin/phpunit` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phpunit_path: Option<PathBuf>,

    /// Directory names never scanned
    pub paths_to_ignore: Vec<String>,

    /// Path fragment marking test sources in stack traces
    pub trace_marker: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            project_path: PathBuf::from("."),
            test_path: PathBuf::from("."),
            processors: 4,
            output_dir: PathBuf::from("storage"),
            output_file: "test-results.json".to_string(),
            db_prefix: DEFAULT_DB_PREFIX.to_string(),
            phpunit_path: None,
            paths_to_ignore: DEFAULT_SKIP_DIRS.iter().map(|d| d.to_string()).collect(),
            trace_marker: DEFAULT_TEST_ROOT.to_string(),
        }
    }
}

impl AppConfig {
    /// Overlay values found in the environment
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(path) = &env.project_path {
            self.project_path = path.into();
        }
        if let Some(path) = &env.test_path {
            self.test_path = path.into();
        }
        if let Some(processors) = env.processors {
            self.processors = processors;
        }
        if let Some(dir) = &env.output_dir {
            self.output_dir = dir.into();
        }
        if let Some(prefix) = &env.db_prefix {
            self.db_prefix = prefix.clone();
        }
        if let Some(path) = &env.phpunit_path {
            self.phpunit_path = Some(path.into());
        }
    }

    /// Directory to scan; `override_path` replaces the configured test path
    pub fn test_root(&self, override_path: Option<&Path>) -> PathBuf {
        let test_path = override_path.unwrap_or(&self.test_path);
        if test_path.is_absolute() {
            test_path.to_path_buf()
        } else {
            self.project_path.join(test_path)
        }
    }

    /// Location of the results file
    pub fn output_path(&self) -> PathBuf {
        let path = self.project_path.join(&self.output_dir).join(&self.output_file);
        std::path::absolute(&path).unwrap_or(path)
    }

    /// Settings handed to the process runner
    pub fn runner_config(&self) -> RunnerConfig {
        let config = RunnerConfig::new(&self.project_path).with_db_prefix(&self.db_prefix);
        match &self.phpunit_path {
            Some(path) => config.with_phpunit_path(path),
            None => config,
        }
    }

    /// Output parser picking source frames under `trace_marker`
    pub fn parser(&self) -> PhpUnitParser {
        PhpUnitParser::new().with_test_root(&self.trace_marker)
    }
}
