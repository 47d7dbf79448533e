//! File name filter
//!
//! Matches test files on their base name. A pattern is tried as a glob
//! first. Wildcard patterns that fail the glob fall back to requiring every
//! literal fragment as a substring, so `*Payment*` also catches
//! `PaymentServiceTest.php`. Plain patterns are substring matches.

use glob::Pattern;
use std::path::{Path, PathBuf};

/// Base-name filter for discovered test files
#[derive(Clone, Debug)]
pub struct NameFilter {
    raw: String,
    glob: Option<Pattern>,
}

impl NameFilter {
    pub fn new(pattern: impl Into<String>) -> Self {
        let raw = pattern.into();
        let glob = Pattern::new(&raw).ok();
        Self { raw, glob }
    }

    pub fn matches(&self, path: &Path) -> bool {
        if self.raw.is_empty() {
            return true;
        }

        let name = match path.file_name() {
            Some(name) => name.to_string_lossy(),
            None => return false,
        };

        if self.glob.as_ref().is_some_and(|glob| glob.matches(&name)) {
            return true;
        }

        if self.raw.contains('*') {
            let mut parts = self.raw.split('*').filter(|part| !part.is_empty()).peekable();
            return parts.peek().is_some() && parts.all(|part| name.contains(part));
        }

        !self.raw.contains('?') && name.contains(self.raw.as_str())
    }

    /// Keep the paths whose base name matches, preserving order
    pub fn apply(&self, paths: Vec<PathBuf>) -> Vec<PathBuf> {
        paths.into_iter().filter(|p| self.matches(p)).collect()
    }
}
