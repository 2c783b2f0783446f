//! Shared test utilities for the SOS workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Test data path helpers
//! - Result assertions
//! - Result row generators
//! - Constants describing the sample catalog
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../../crates/test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{assert_result_times, offerings};
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Assert that a result string holds exactly the given timestamps, in order.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_result_times;
///
/// assert_result_times!(values, ["2007-05-01T02:59:00.0", "2007-05-01T03:59:00.0"]);
/// ```
#[macro_export]
macro_rules! assert_result_times {
    ($values:expr, [$($time:expr),* $(,)?]) => {{
        let expected: Vec<&str> = vec![$($time),*];
        let values = &$values;
        let actual = $crate::result_times(values);
        assert_eq!(
            actual, expected,
            "unexpected rows in result values `{}`",
            values
        );
    }};
}

/// Timestamps of an `@@`-separated result string, in order.
pub fn result_times(values: &str) -> Vec<&str> {
    values
        .split("@@")
        .filter(|block| !block.is_empty())
        .filter_map(|block| block.split(',').next())
        .collect()
}
