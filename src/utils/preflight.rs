//! Preflight validation checks for early failure detection
//!
//! Commands call these before snapshotting or contacting the planner, so
//! a missing repository or API key fails fast with a clear message.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::git::GitRepository;
use crate::utils::settings::{get_env_var, get_env_vars};

/// Result of AI credential validation
#[derive(Debug)]
pub struct AiCredentialInfo {
    /// The model that will be used
    pub model: String,
}

/// Validate AI credentials are available before processing
///
/// This performs a lightweight check of environment variables and
/// settings without creating a client.
pub fn check_ai_credentials(model_override: Option<&str>) -> Result<AiCredentialInfo> {
    let model = model_override
        .map(String::from)
        .or_else(|| get_env_var("GIT_SPLIT_MODEL").ok())
        .or_else(|| get_env_var("ANTHROPIC_MODEL").ok())
        .unwrap_or_else(|| crate::claude::DEFAULT_MODEL.to_string());

    get_env_vars(&["CLAUDE_API_KEY", "ANTHROPIC_API_KEY"]).map_err(|_| {
        anyhow::anyhow!(
            "Claude API key not found.\n\
             Set one of these environment variables:\n\
             - CLAUDE_API_KEY\n\
             - ANTHROPIC_API_KEY"
        )
    })?;

    Ok(AiCredentialInfo { model })
}

/// Validate `path` is inside a git repository with a working tree
///
/// Returns the repository, so callers can locate its root.
pub fn check_git_repository(path: &Path) -> Result<GitRepository> {
    let repo = GitRepository::open_at(path).context(
        "Not in a git repository. Please run this command from within a git repository.",
    )?;
    repo.workdir()?;
    Ok(repo)
}

/// Validate nothing is staged, since a split owns the index
///
/// Lists the staged entries in the error so the user knows what to unstage.
pub fn check_index_empty(repo: &GitRepository) -> Result<()> {
    let staged = repo
        .staged_entries()
        .context("Failed to read index status")?;

    if !staged.is_empty() {
        let mut message = String::from("The index already has staged changes:\n");
        for entry in &staged {
            message.push_str(&format!("  {} {}\n", entry.status, entry.path));
        }
        message.push_str("\nUnstage them (git reset) before splitting.");
        bail!(message);
    }

    Ok(())
}

/// Combined preflight check for the split command
///
/// Validates:
/// - Git repository access
/// - An empty index
/// - AI credentials (skipped when a saved plan is supplied)
pub fn check_split_prerequisites(
    path: &Path,
    model_override: Option<&str>,
    needs_planner: bool,
) -> Result<(GitRepository, Option<AiCredentialInfo>)> {
    let repo = check_git_repository(path)?;
    check_index_empty(&repo)?;
    let credentials = if needs_planner {
        Some(check_ai_credentials(model_override)?)
    } else {
        None
    };
    Ok((repo, credentials))
}
