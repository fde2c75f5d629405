//! Validate command: checks a saved plan against the working tree.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::data::plan::Plan;
use crate::split::{Granularity, SplitError};
use crate::utils::{check_git_repository, Settings};

/// Validate command options.
#[derive(Parser)]
pub struct ValidateCommand {
    /// Plan file (.json, .yaml or .yml).
    #[arg(value_name = "PLAN_FILE")]
    pub plan_file: PathBuf,

    /// Unit of decomposition the plan was made for: hunk (default) or file.
    #[arg(long, value_name = "hunk|file")]
    pub granularity: Option<Granularity>,

    /// Repository to check against (defaults to the current directory).
    #[arg(long, value_name = "DIR")]
    pub repo: Option<PathBuf>,
}

impl ValidateCommand {
    /// Executes the validate command.
    pub fn execute(self) -> Result<()> {
        let settings = Settings::load().context("Failed to load settings")?.split;
        let plan = Plan::load_from_file(&self.plan_file)?;

        let repo = check_git_repository(super::repo_path(self.repo.as_ref()))?;
        let workdir = repo.workdir()?;
        let engine = super::build_engine(&workdir, self.granularity, &settings);
        let snapshot = engine.snapshot()?;

        plan.validate(&snapshot)
            .map_err(SplitError::from)
            .with_context(|| format!("Plan {} is invalid", self.plan_file.display()))?;

        println!(
            "✅ Plan is valid: {} commit(s) cover {} hunk(s) and {} file operation(s)",
            plan.commits.len(),
            snapshot.hunks.len(),
            snapshot.operations.len()
        );
        Ok(())
    }
}
