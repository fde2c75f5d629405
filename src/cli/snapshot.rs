//! Snapshot command: prints hunks and file operations.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::data::snapshot::Snapshot;
use crate::split::Granularity;
use crate::utils::{check_git_repository, Settings};

/// Snapshot command options.
#[derive(Parser)]
pub struct SnapshotCommand {
    /// Unit of decomposition: hunk (default) or file.
    #[arg(long, value_name = "hunk|file")]
    pub granularity: Option<Granularity>,

    /// Output format: yaml (default) or json.
    #[arg(long, default_value = "yaml")]
    pub format: String,

    /// Repository to inspect (defaults to the current directory).
    #[arg(long, value_name = "DIR")]
    pub repo: Option<PathBuf>,
}

impl SnapshotCommand {
    /// Executes the snapshot command.
    pub fn execute(self) -> Result<()> {
        let settings = Settings::load().context("Failed to load settings")?.split;
        let repo = check_git_repository(super::repo_path(self.repo.as_ref()))?;
        let workdir = repo.workdir()?;

        let engine = super::build_engine(&workdir, self.granularity, &settings);
        let snapshot = engine.snapshot()?;
        print!("{}", render(&snapshot, &self.format)?);
        Ok(())
    }
}

/// Serializes the snapshot in the requested format.
fn render(snapshot: &Snapshot, format: &str) -> Result<String> {
    match format.to_lowercase().as_str() {
        "yaml" | "yml" => crate::data::to_yaml(snapshot).context("Failed to serialize snapshot"),
        "json" => serde_json::to_string_pretty(snapshot)
            .map(|json| json + "\n")
            .context("Failed to serialize snapshot"),
        other => anyhow::bail!("Unknown output format '{other}' (expected 'yaml' or 'json')"),
    }
}
