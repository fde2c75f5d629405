//! Git operations and repository management.

pub mod diff_split;
pub mod repository;
pub mod runner;
pub mod status;

#[cfg(test)]
pub(crate) mod test_utils;

pub use diff_split::{extract_binary_ops, merge_hunks_by_file, parse_hunks};
pub use repository::{GitRepository, StagedEntry};
pub use runner::{GitCommandError, GitCommands, GitOutput, GitRunner, ProcessRunner, RetryPolicy};
pub use status::{parse_status, StatusReport};
