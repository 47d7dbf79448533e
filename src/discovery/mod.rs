//! Test discovery
//!
//! Locates test files on disk, narrows them by name and lists the test
//! cases they declare.

mod cases;
mod filter;
mod scanner;

pub use cases::CaseFinder;
pub use filter::NameFilter;
pub use scanner::{Scanner, DEFAULT_SKIP_DIRS};
