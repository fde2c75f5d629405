//! CLI interface for git-split.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod snapshot;
pub mod split;
pub mod validate;

use crate::git::{GitCommands, ProcessRunner};
use crate::split::{Granularity, SplitEngine};
use crate::utils::SplitSettings;

/// git-split: Split uncommitted changes into small, atomic commits.
#[derive(Parser)]
#[command(name = "git-split")]
#[command(about = "Split uncommitted changes into small, atomic, conventional commits", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Plans and creates commits from the working tree's changes.
    Split(split::SplitCommand),
    /// Prints the addressable snapshot of the working tree's changes.
    Snapshot(snapshot::SnapshotCommand),
    /// Checks a saved plan against the current working tree.
    Validate(validate::ValidateCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Split(cmd) => cmd.execute().await,
            Commands::Snapshot(cmd) => cmd.execute(),
            Commands::Validate(cmd) => cmd.execute(),
        }
    }
}

/// Returns the repository path argument, defaulting to the current directory.
fn repo_path(repo: Option<&PathBuf>) -> &Path {
    repo.map_or_else(|| Path::new("."), PathBuf::as_path)
}

/// Builds a split engine rooted at `workdir`.
///
/// The CLI granularity flag wins over settings.
pub(crate) fn build_engine(
    workdir: &Path,
    granularity: Option<Granularity>,
    settings: &SplitSettings,
) -> SplitEngine {
    let git = GitCommands::new(Box::new(ProcessRunner::new(workdir)))
        .with_retry(settings.retry_policy());
    SplitEngine::new(git)
        .with_granularity(granularity.unwrap_or(settings.granularity))
        .with_excerpt_limits(settings.excerpt_limits())
}
