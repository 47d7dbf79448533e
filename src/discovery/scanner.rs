//! Test file scanner
//!
//! Walks a directory tree collecting `*Test.php` files, pruning hidden
//! directories and a configurable skip list.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};

/// Suffix identifying PHPUnit test files
pub const TEST_FILE_SUFFIX: &str = "Test.php";

/// Directories never descended into by default
pub const DEFAULT_SKIP_DIRS: &[&str] = &[
    "vendor",
    "node_modules",
    "public",
    "storage",
    "bootstrap",
    "config",
    "database",
    "resources",
    "routes",
];

/// Recursive test file finder
#[derive(Clone, Debug)]
pub struct Scanner {
    skip_dirs: HashSet<String>,
}

impl Scanner {
    pub fn new<I, S>(skip_dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            skip_dirs: skip_dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Find every test file under `root`, sorted by path
    pub fn scan(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let metadata =
            std::fs::metadata(root).map_err(|_| Error::PathNotFound(root.to_path_buf()))?;
        if !metadata.is_dir() {
            return Err(Error::NotADirectory(root.to_path_buf()));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_pruned(entry));

        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() && is_test_file(entry.path()) {
                files.push(entry.into_path());
            }
        }

        debug!("Found {} test files under {}", files.len(), root.display());
        Ok(files)
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        if !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.') || self.skip_dirs.contains(name.as_ref())
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(DEFAULT_SKIP_DIRS.iter().copied())
    }
}

fn is_test_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(TEST_FILE_SUFFIX))
        .unwrap_or(false)
}
