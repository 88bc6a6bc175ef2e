//! Shared utilities for the mitomorph workspace.

pub mod file_utils;
pub mod log_setup;
pub mod parallel;
pub mod test_utils;
