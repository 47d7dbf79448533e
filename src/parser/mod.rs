//! Test output parsing
//!
//! Turns the raw combined output of a test process into structured failures
//! and aggregate test case counts.

mod phpunit;

pub use phpunit::{PhpUnitParser, DEFAULT_TEST_ROOT};
