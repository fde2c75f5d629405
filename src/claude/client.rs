//! Claude client for commit split planning.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::claude::ai::claude::ClaudeAiClient;
use crate::claude::ai::{AiClient, AiClientMetadata};
use crate::claude::error::ClaudeError;
use crate::claude::{prompts, response};
use crate::data::plan::Plan;
use crate::data::snapshot::SnapshotForAI;
use crate::utils::settings::{get_env_var, get_env_vars};

/// Model used when neither a flag, settings nor the environment pick one.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Claude client producing split plans through an [`AiClient`].
pub struct ClaudeClient {
    /// AI client implementation.
    ai_client: Box<dyn AiClient>,
}

impl ClaudeClient {
    /// Creates a new client with the provided AI client implementation.
    pub fn new(ai_client: Box<dyn AiClient>) -> Self {
        Self { ai_client }
    }

    /// Returns metadata about the AI client.
    pub fn get_ai_client_metadata(&self) -> AiClientMetadata {
        self.ai_client.get_metadata()
    }

    /// Sends a raw prompt pair to the AI client.
    pub async fn send_message(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.ai_client
            .send_request(system_prompt, user_prompt)
            .await
    }

    /// Asks the planner to group the snapshot's units into commits.
    ///
    /// The returned plan is parsed but not yet validated.
    pub async fn generate_split_plan(&self, snapshot: &SnapshotForAI) -> Result<Plan> {
        let snapshot_yaml =
            crate::data::to_yaml(snapshot).context("Failed to serialize snapshot to YAML")?;
        let user_prompt = prompts::generate_split_user_prompt(&snapshot_yaml);

        let metadata = self.ai_client.get_metadata();
        info!(
            provider = %metadata.provider,
            model = %metadata.model,
            max_response_tokens = metadata.max_response_length,
            hunks = snapshot.hunks.len(),
            operations = snapshot.operations.len(),
            prompt_len = user_prompt.len(),
            "Requesting split plan"
        );

        let content = self
            .send_message(prompts::SPLIT_SYSTEM_PROMPT, &user_prompt)
            .await
            .context("Planner request failed")?;
        debug!(response_len = content.len(), "Planner responded");

        Ok(response::parse_plan_response(&content)?)
    }
}

/// Creates a Claude client from the environment, settings and optional model override.
pub fn create_default_claude_client(model: Option<String>) -> Result<ClaudeClient> {
    let model = model
        .or_else(|| get_env_var("GIT_SPLIT_MODEL").ok())
        .or_else(|| get_env_var("ANTHROPIC_MODEL").ok())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let api_key = get_env_vars(&["CLAUDE_API_KEY", "ANTHROPIC_API_KEY"])
        .map_err(|_| ClaudeError::ApiKeyNotFound)?;

    debug!(model = %model, "Creating Claude client");
    let ai_client = ClaudeAiClient::new(model, api_key)?;
    Ok(ClaudeClient::new(Box::new(ai_client)))
}
