//! Planner fake for `claude` tests.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::claude::ai::{AiClient, AiClientMetadata};

/// Recorded `(system_prompt, user_prompt)` pairs.
pub(crate) type PromptLog = Arc<Mutex<Vec<(String, String)>>>;

/// Answers split-plan requests from a queue of canned planner replies.
pub(crate) struct ScriptedPlanner {
    replies: Mutex<VecDeque<Result<String>>>,
    prompts: PromptLog,
}

impl ScriptedPlanner {
    pub(crate) fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: PromptLog::default(),
        }
    }

    /// Shared log of the prompts sent, readable after the planner is boxed.
    pub(crate) fn prompt_log(&self) -> PromptLog {
        Arc::clone(&self.prompts)
    }
}

impl AiClient for ScriptedPlanner {
    fn send_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        self.prompts
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("planner has no reply left")));
        Box::pin(async move { reply })
    }

    fn get_metadata(&self) -> AiClientMetadata {
        AiClientMetadata {
            provider: "Scripted".to_string(),
            model: "scripted-planner".to_string(),
            max_response_length: 4_096,
        }
    }
}
