//! Settings and configuration utilities.
//!
//! Settings are read from $HOME/.git-split/settings.json. The `env`
//! section is a fallback for environment variables; the `split` section
//! tunes the split engine.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::snapshot::ExcerptLimits;
use crate::git::RetryPolicy;
use crate::split::Granularity;

/// Settings loaded from $HOME/.git-split/settings.json.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Environment variable overrides.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Split engine tuning.
    #[serde(default)]
    pub split: SplitSettings,
}

/// Tuning knobs for the split engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SplitSettings {
    /// Hunk- or file-granular decomposition.
    pub granularity: Granularity,
    /// Maximum hunk body lines sent to the planner.
    pub excerpt_lines: usize,
    /// Maximum hunk body characters sent to the planner.
    pub excerpt_chars: usize,
    /// Retries for git index lock contention.
    pub lock_retries: u32,
    /// Delay between lock retries, in milliseconds.
    pub lock_retry_delay_ms: u64,
    /// Planner model override.
    pub model: Option<String>,
}

impl Default for SplitSettings {
    fn default() -> Self {
        let limits = ExcerptLimits::default();
        let retry = RetryPolicy::default();
        Self {
            granularity: Granularity::default(),
            excerpt_lines: limits.max_lines,
            excerpt_chars: limits.max_chars,
            lock_retries: retry.retries,
            lock_retry_delay_ms: retry.delay.as_millis() as u64,
            model: None,
        }
    }
}

impl SplitSettings {
    /// Excerpt bounds for planner payloads.
    pub fn excerpt_limits(&self) -> ExcerptLimits {
        ExcerptLimits {
            max_lines: self.excerpt_lines,
            max_chars: self.excerpt_chars,
        }
    }

    /// Retry budget for transient git failures.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.lock_retries,
            delay: Duration::from_millis(self.lock_retry_delay_ms),
        }
    }
}

impl Settings {
    /// Loads settings from the default location.
    pub fn load() -> Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Self::load_from_path(&settings_path)
    }

    /// Loads settings from a specific path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // If file doesn't exist, return default settings
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        serde_json::from_str::<Self>(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// Returns the default settings path.
    pub fn get_settings_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;

        Ok(home_dir.join(".git-split").join("settings.json"))
    }
}

/// Returns an environment variable with fallback to settings.
pub fn get_env_var(key: &str) -> Result<String> {
    if let Ok(value) = env::var(key) {
        return Ok(value);
    }

    let settings =
        Settings::load().with_context(|| format!("Environment variable not found: {key}"))?;
    settings
        .get_env_var(key)
        .ok_or_else(|| anyhow::anyhow!("Environment variable not found: {key}"))
}

/// Tries multiple environment variables with fallback to settings.
pub fn get_env_vars(keys: &[&str]) -> Result<String> {
    keys.iter()
        .find_map(|key| get_env_var(key).ok())
        .ok_or_else(|| anyhow::anyhow!("None of the environment variables found: {keys:?}"))
}
