//! Claude API client implementation.

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{build_http_client, check_error_response, log_response_success};
use super::{AiClient, AiClientMetadata};
use crate::claude::error::ClaudeError;

/// Messages endpoint of the Anthropic API.
const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

/// API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Output token budget for a plan response.
const MAX_OUTPUT_TOKENS: i32 = 8192;

/// Claude API request message.
#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

/// Claude API request body.
#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: i32,
    system: String,
    messages: Vec<Message>,
}

/// Claude API response content.
#[derive(Deserialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

/// Claude API response.
#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<Content>,
}

/// Claude API client implementation.
pub struct ClaudeAiClient {
    /// HTTP client for API requests.
    client: Client,
    /// API key for authentication.
    api_key: String,
    /// Model identifier.
    model: String,
}

impl ClaudeAiClient {
    /// Creates a new Claude AI client.
    pub fn new(model: String, api_key: String) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            api_key,
            model,
        })
    }
}

impl AiClient for ClaudeAiClient {
    fn send_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            debug!(
                system_prompt_len = system_prompt.len(),
                user_prompt_len = user_prompt.len(),
                model = %self.model,
                "Preparing Claude API request"
            );

            let request = ClaudeRequest {
                model: self.model.clone(),
                max_tokens: MAX_OUTPUT_TOKENS,
                system: system_prompt.to_string(),
                messages: vec![Message {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                }],
            };

            info!(
                url = MESSAGES_URL,
                model = %self.model,
                max_tokens = MAX_OUTPUT_TOKENS,
                "Sending request to Claude API"
            );

            let response = self
                .client
                .post(MESSAGES_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request)
                .send()
                .await
                .map_err(|e| ClaudeError::NetworkError(e.to_string()))?;

            let response = check_error_response(response).await?;

            let claude_response: ClaudeResponse = response
                .json()
                .await
                .map_err(|e| ClaudeError::InvalidResponseFormat(e.to_string()))?;

            debug!(
                content_count = claude_response.content.len(),
                "Received Claude API response"
            );

            let result = claude_response
                .content
                .into_iter()
                .find(|c| c.content_type == "text")
                .map(|c| c.text)
                .ok_or_else(|| {
                    ClaudeError::InvalidResponseFormat("No text content in response".to_string())
                        .into()
                });

            log_response_success("Claude", &result);
            result
        })
    }

    fn get_metadata(&self) -> AiClientMetadata {
        AiClientMetadata {
            provider: "Anthropic".to_string(),
            model: self.model.clone(),
            max_response_length: MAX_OUTPUT_TOKENS as usize,
        }
    }
}
