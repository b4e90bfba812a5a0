//! Mock LLM backends.
//!
//! The suite never touches the network: every test drives the pipeline
//! through a scripted or deterministic `ChatBackend`.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use voidcat_core::{ChatBackend, Completion, CompletionRequest, CoreError};

/// Build the structured stage-reply JSON the thinking engine expects.
pub fn stage_json(stage: &str, text: &str, confidence: f64) -> String {
    serde_json::json!({ "stage": stage, "text": text, "confidence": confidence }).to_string()
}

/// Returns scripted replies in order, then repeats a fallback synthesis.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<String>>,
    fallback: String,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            fallback: stage_json("synthesis", "fallback conclusion", 0.8),
        }
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, CoreError> {
        let text = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        Ok(Completion { text, prompt_tokens: 1, completion_tokens: 1 })
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Replies with a confident synthesis that echoes knowledge found in the
/// prompt; a stand-in for a live model in retrieval tests.
pub struct EchoBackend;

#[async_trait]
impl ChatBackend for EchoBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CoreError> {
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let text = if prompt.contains("Lakeview") {
            "The capital of Freedonia is Lakeview [facts.md]."
        } else {
            "A synthesized answer."
        };
        Ok(Completion {
            text: stage_json("synthesis", text, 0.9),
            prompt_tokens: 1,
            completion_tokens: 1,
        })
    }

    fn describe(&self) -> String {
        "echo".to_string()
    }
}

/// Always offline.
pub struct OfflineBackend;

#[async_trait]
impl ChatBackend for OfflineBackend {
    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, CoreError> {
        Err(CoreError::LlmUnavailable("connection refused".to_string()))
    }

    fn describe(&self) -> String {
        "offline".to_string()
    }
}
