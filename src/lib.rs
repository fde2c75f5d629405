//! # git-split
//!
//! Splits a working tree's uncommitted changes into a sequence of small,
//! logically coherent commits.
//!
//! ## Features
//!
//! - Lossless decomposition of changes into addressable hunks and whole-file operations
//! - Plan validation that guarantees every change is committed exactly once
//! - Transactional replay of a plan as verified commits, staging through the index only
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use git_split::git::{GitCommands, ProcessRunner};
//! use git_split::split::SplitEngine;
//!
//! let engine = SplitEngine::new(GitCommands::new(Box::new(ProcessRunner::new("."))));
//! let snapshot = engine.snapshot()?;
//! println!("{} hunks", snapshot.hunks.len());
//! # Ok::<(), git_split::split::SplitError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod claude;
pub mod cli;
pub mod data;
pub mod git;
pub mod split;
pub mod utils;

pub use crate::cli::Cli;

/// The current version of git-split.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
