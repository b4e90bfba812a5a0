//! LLM gateway.
//!
//! Abstracts the chat-completion provider behind [`ChatBackend`] and adds
//! retry with exponential backoff, a concurrency cap with queuing
//! back-pressure, and cooperative cancellation. The production backend
//! speaks the OpenAI-compatible `/chat/completions` wire format.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::{CoreError, Result};

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A chat-completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A completed reply with token accounting.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Provider seam. Implementations perform exactly one attempt; retry policy
/// lives in the gateway.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;

    /// Short provider label for diagnostics.
    fn describe(&self) -> String {
        "unknown".to_string()
    }
}

// ============================================================================
// OPENAI-COMPATIBLE BACKEND
// ============================================================================

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Backend for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiBackend {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url
                .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = WireRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CoreError::LlmUnavailable(format!("transport error: {e}")))?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::LlmUnavailable(format!(
                "provider returned {status}: {body}"
            )));
        }
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::InvalidArgument(format!(
                "provider rejected request ({status}): {body}"
            )));
        }

        let body: WireResponse = response
            .json()
            .await
            .map_err(|e| CoreError::LlmBadReply(format!("malformed completion body: {e}")))?;
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CoreError::LlmBadReply("completion had no content".to_string()))?;
        let usage = body.usage.unwrap_or_default();

        Ok(Completion {
            text,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }

    fn describe(&self) -> String {
        format!("openai-compatible ({})", self.base_url)
    }
}

// ============================================================================
// GATEWAY
// ============================================================================

/// Gateway in front of a [`ChatBackend`]: retry, concurrency cap,
/// cancellation.
pub struct LlmGateway {
    backend: Arc<dyn ChatBackend>,
    limiter: Arc<Semaphore>,
    retry_base_ms: u64,
    retry_cap_ms: u64,
    max_attempts: u32,
}

impl LlmGateway {
    pub fn new(backend: Arc<dyn ChatBackend>, config: &LlmConfig) -> Self {
        Self {
            backend,
            limiter: Arc::new(Semaphore::new(config.concurrency.max(1))),
            retry_base_ms: config.retry_base_ms,
            retry_cap_ms: config.retry_cap_ms,
            max_attempts: config.max_attempts.max(1),
        }
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    /// Issue a completion. Transport/5xx failures retry with exponential
    /// backoff; other errors propagate immediately. Queues behind the
    /// concurrency cap and aborts promptly on cancellation.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<Completion> {
        let _permit = tokio::select! {
            permit = self.limiter.clone().acquire_owned() => {
                permit.map_err(|_| CoreError::Internal("LLM limiter closed".to_string()))?
            }
            _ = cancel.cancelled() => return Err(CoreError::Cancelled),
        };

        let mut last_error = None;
        for attempt in 0..self.max_attempts {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            if attempt > 0 {
                let delay = self.backoff_delay(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying LLM call");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(CoreError::Cancelled),
                }
            }

            let result = tokio::select! {
                result = self.backend.complete(request) => result,
                _ = cancel.cancelled() => return Err(CoreError::Cancelled),
            };
            match result {
                Ok(completion) => return Ok(completion),
                Err(error @ CoreError::LlmUnavailable(_)) => {
                    warn!(attempt, %error, "LLM attempt failed");
                    last_error = Some(error);
                }
                Err(other) => return Err(other),
            }
        }

        Err(last_error
            .unwrap_or_else(|| CoreError::LlmUnavailable("retries exhausted".to_string())))
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .retry_base_ms
            .saturating_mul(1u64 << attempt.min(16))
            .min(self.retry_cap_ms);
        Duration::from_millis(exp)
    }
}

// ============================================================================
// TESTS
// ============================================================================
