//! Claude API integration for commit split planning.

pub mod ai;
pub mod client;
pub mod error;
pub mod prompts;
pub mod response;

#[cfg(test)]
pub(crate) mod test_utils;

pub use ai::claude::ClaudeAiClient;
pub use ai::{AiClient, AiClientMetadata};
pub use client::{create_default_claude_client, ClaudeClient, DEFAULT_MODEL};
pub use error::ClaudeError;
pub use response::{extract_json_object, parse_plan_response};
