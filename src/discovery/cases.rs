//! Test case discovery
//!
//! Finds the test methods declared in a PHPUnit file by source inspection:
//! methods named `test*` and methods annotated with `@test`.

use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::Result;

const MODIFIERS: &str = r"(?:(?:public|protected|private|static|final|abstract)\s+)*";

static TEST_METHOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?m)^\s*{MODIFIERS}function\s+(test\w*)\s*\("
    ))
    .expect("valid test method pattern")
});

/// `@test` inside a docblock, followed by the method it annotates
static ANNOTATED_METHOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"/\*\*(?:[^*]|\*[^/])*?@test\b(?:[^*]|\*[^/])*\*/\s*{MODIFIERS}function\s+(\w+)\s*\("
    ))
    .expect("valid annotated method pattern")
});

/// `#[Test]` attribute, PHPUnit 10 and later
static ATTRIBUTE_METHOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"#\[(?:\\?PHPUnit\\Framework\\Attributes\\)?Test\]\s*{MODIFIERS}function\s+(\w+)\s*\("
    ))
    .expect("valid attribute method pattern")
});

/// Source-level test case finder
#[derive(Clone, Copy, Debug, Default)]
pub struct CaseFinder;

impl CaseFinder {
    pub fn new() -> Self {
        Self
    }

    /// Test case names declared in `path`, sorted and de-duplicated
    pub fn find(&self, path: &Path) -> Result<Vec<String>> {
        let source = std::fs::read_to_string(path)?;
        Ok(self.find_in(&source))
    }

    pub fn find_in(&self, source: &str) -> Vec<String> {
        let mut cases = BTreeSet::new();

        for pattern in [&*TEST_METHOD, &*ANNOTATED_METHOD, &*ATTRIBUTE_METHOD] {
            for caps in pattern.captures_iter(source) {
                cases.insert(caps[1].to_string());
            }
        }

        cases.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SOURCE: &str = r#"<?php

namespace Tests\Feature;

use PHPUnit\Framework\Attributes\Test;

class UserTest extends TestCase
{
    protected function setUp(): void
    {
        parent::setUp();
    }

    public function testCreateUser(): void
    {
        $this->assertTrue(true);
    }

    function test_user_login()
    {
    }

    final public static function testStatic() {}

    /**
     * Deletes a user.
     *
     * @test
     */
    public function it_deletes_a_user(): void
    {
    }

    /** @test */
    public function it_updates_a_user(): void {}

    #[Test]
    public function it_lists_users(): void {}

    /**
     * Not a test.
     */
    public function helper(): void {}

    public function testCreateUser_duplicateName() {}
}
"#;

    #[test]
    fn test_find_in_collects_all_styles() {
        let cases = CaseFinder::new().find_in(SOURCE);
        assert_eq!(
            cases,
            [
                "it_deletes_a_user",
                "it_lists_users",
                "it_updates_a_user",
                "testCreateUser",
                "testCreateUser_duplicateName",
                "testStatic",
                "test_user_login",
            ]
        );
    }

    #[test]
    fn test_docblock_without_annotation_is_ignored() {
        let source = "/**\n * Helper\n */\npublic function helper() {}\n\n/** @test */\npublic function real() {}\n";
        assert_eq!(CaseFinder::new().find_in(source), ["real"]);
    }

    #[test]
    fn test_find_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("UserTest.php");
        std::fs::write(&path, SOURCE).unwrap();

        let cases = CaseFinder::new().find(&path).unwrap();
        assert_eq!(cases.len(), 7);
    }

    #[test]
    fn test_find_missing_file() {
        let dir = tempdir().unwrap();
        assert!(CaseFinder::new().find(&dir.path().join("Nope.php")).is_err());
    }
}
