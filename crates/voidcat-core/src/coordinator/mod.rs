//! Enhanced RAG coordinator.
//!
//! Composes retrieval (baseline + Context7), the sequential thinking
//! engine, and the LLM gateway into one pipeline with a documented
//! fallback chain: Context7 -> baseline top-k -> basic completion ->
//! structured error. Most infrastructure failures become degraded
//! successes carrying a `degraded_reason`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConfigPatch, EngineConfig};
use crate::context7::Context7Engine;
use crate::error::{CoreError, Result};
use crate::knowledge::Corpus;
use crate::llm::{ChatMessage, CompletionRequest, LlmGateway};
use crate::retrieval::{BaselineRetriever, ContextBundle};
use crate::thinking::{ReasoningTrace, TerminationReason, ThinkingEngine, ThinkingOptions};

/// Per-query options.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Use the Context7 engine (vs raw top-k).
    pub enhanced: bool,
    pub max_thoughts: Option<usize>,
    pub branch_cap: Option<usize>,
    /// Cap on retrieval sources consulted by Context7.
    pub context_sources: Option<usize>,
    pub include_trace: bool,
    pub timeout_ms: Option<u64>,
    pub model: Option<String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enhanced: true,
            max_thoughts: None,
            branch_cap: None,
            context_sources: None,
            include_trace: true,
            timeout_ms: None,
            model: None,
        }
    }
}

/// Per-query diagnostic trace returned with every answer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub enhanced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
    pub context_sources_used: usize,
    pub thoughts: usize,
    pub branches: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_path: Option<String>,
    pub duration_ms: u64,
}

/// A successful (possibly degraded) pipeline result.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub answer: String,
    pub trace: Option<ReasoningTrace>,
    pub diagnostics: Diagnostics,
}

/// A pipeline failure carrying whatever diagnostics were gathered before
/// the chain ran out.
#[derive(Debug)]
pub struct QueryFailure {
    pub error: CoreError,
    pub diagnostics: Diagnostics,
}

impl From<CoreError> for QueryFailure {
    fn from(error: CoreError) -> Self {
        Self { error, diagnostics: Diagnostics::default() }
    }
}

/// Cached health snapshot served by `diagnostics`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub status: String,
    pub documents: usize,
    pub vocabulary: usize,
    pub llm_backend: String,
    pub model: String,
    pub enhanced_enabled: bool,
    pub thinking_enabled: bool,
    pub refreshed_at: DateTime<Utc>,
}

/// The pipeline coordinator (C6).
pub struct Coordinator {
    corpus: Arc<Corpus>,
    retriever: BaselineRetriever,
    context7: Context7Engine,
    thinking: ThinkingEngine,
    gateway: Arc<LlmGateway>,
    config: RwLock<EngineConfig>,
    status_cache: RwLock<Option<(Instant, StatusSnapshot)>>,
}

impl Coordinator {
    pub fn new(corpus: Arc<Corpus>, gateway: Arc<LlmGateway>, config: EngineConfig) -> Self {
        let retriever = BaselineRetriever::new(Arc::clone(&corpus));
        Self {
            corpus,
            context7: Context7Engine::new(retriever.clone()),
            thinking: ThinkingEngine::new(Arc::clone(&gateway)),
            retriever,
            gateway,
            config: RwLock::new(config),
            status_cache: RwLock::new(None),
        }
    }

    /// Current configuration snapshot.
    pub async fn config(&self) -> EngineConfig {
        self.config.read().await.clone()
    }

    /// Apply a runtime patch and return the new configuration.
    pub async fn configure(&self, patch: &ConfigPatch) -> EngineConfig {
        let mut config = self.config.write().await;
        patch.apply(&mut config);
        info!("engine configuration updated");
        // Invalidate the cached health snapshot; toggles changed.
        *self.status_cache.write().await = None;
        config.clone()
    }

    /// Full pipeline with fallback chain and timeout.
    pub async fn query(
        &self,
        text: &str,
        options: &QueryOptions,
    ) -> std::result::Result<QueryOutcome, QueryFailure> {
        validate_query(text)?;
        let started = Instant::now();
        let config = self.config().await;
        let cancel = CancellationToken::new();

        let pipeline = self.run_pipeline(text, options, &config, &cancel);
        tokio::pin!(pipeline);

        let (mut result, timed_out) = match options.timeout_ms {
            Some(timeout) => {
                tokio::select! {
                    result = &mut pipeline => (result, false),
                    _ = tokio::time::sleep(Duration::from_millis(timeout)) => {
                        warn!(timeout_ms = timeout, "query timed out, cancelling pipeline");
                        cancel.cancel();
                        // The engines observe the token and return a partial.
                        (pipeline.await, true)
                    }
                }
            }
            None => (pipeline.await, false),
        };

        let duration = started.elapsed().as_millis() as u64;
        match &mut result {
            Ok(outcome) => {
                outcome.diagnostics.duration_ms = duration;
                if timed_out {
                    outcome.diagnostics.degraded_reason = Some("timeout".to_string());
                }
                if !options.include_trace {
                    outcome.trace = None;
                }
            }
            Err(failure) => {
                failure.diagnostics.duration_ms = duration;
                if timed_out {
                    failure.error = CoreError::Timeout(options.timeout_ms.unwrap_or_default());
                }
            }
        }
        result
    }

    /// Baseline retrieval + one completion; no thinking engine (C3 + C2).
    pub async fn query_basic(
        &self,
        text: &str,
        model: Option<&str>,
    ) -> std::result::Result<QueryOutcome, QueryFailure> {
        validate_query(text)?;
        let started = Instant::now();
        let config = self.config().await;
        let cancel = CancellationToken::new();

        let mut diagnostics = Diagnostics::default();
        let bundle = self.baseline_bundle(text, &config, &mut diagnostics);
        let answer = self
            .basic_completion(text, &bundle, model, &config, &cancel)
            .await
            .map_err(|error| QueryFailure { error, diagnostics: diagnostics.clone() })?;

        diagnostics.duration_ms = started.elapsed().as_millis() as u64;
        Ok(QueryOutcome { answer, trace: None, diagnostics })
    }

    /// Thinking engine over no retrieval context.
    pub async fn sequential_only(
        &self,
        text: &str,
        options: &QueryOptions,
    ) -> std::result::Result<QueryOutcome, QueryFailure> {
        validate_query(text)?;
        let started = Instant::now();
        let config = self.config().await;
        let cancel = CancellationToken::new();

        let thinking_options = self.thinking_options(options, &config);
        let outcome = self
            .thinking
            .run(
                text,
                &ContextBundle::default(),
                &thinking_options,
                &config.thinking,
                &cancel,
            )
            .await
            .map_err(QueryFailure::from)?;

        let diagnostics = Diagnostics {
            enhanced: false,
            thoughts: outcome.trace.thoughts.len(),
            branches: outcome.trace.branch_count,
            complexity: Some(outcome.trace.complexity.as_str().to_string()),
            duration_ms: started.elapsed().as_millis() as u64,
            ..Default::default()
        };
        Ok(QueryOutcome {
            answer: outcome.answer,
            trace: Some(outcome.trace),
            diagnostics,
        })
    }

    /// Cached health snapshot, refreshed when stale.
    pub async fn diagnostics(&self) -> StatusSnapshot {
        let config = self.config().await;
        let ttl = Duration::from_secs(config.diagnostics_refresh_secs.max(1));
        {
            let cache = self.status_cache.read().await;
            if let Some((at, snapshot)) = cache.as_ref() {
                if at.elapsed() < ttl {
                    return snapshot.clone();
                }
            }
        }

        let snapshot = StatusSnapshot {
            status: if self.corpus.is_empty() { "degraded".into() } else { "ok".into() },
            documents: self.corpus.len(),
            vocabulary: self.corpus.vocabulary_len(),
            llm_backend: self.gateway.describe(),
            model: config.llm.model.clone(),
            enhanced_enabled: config.enhanced_enabled,
            thinking_enabled: config.thinking_enabled,
            refreshed_at: Utc::now(),
        };
        *self.status_cache.write().await = Some((Instant::now(), snapshot.clone()));
        snapshot
    }

    // ------------------------------------------------------------------
    // Pipeline internals
    // ------------------------------------------------------------------

    async fn run_pipeline(
        &self,
        text: &str,
        options: &QueryOptions,
        config: &EngineConfig,
        cancel: &CancellationToken,
    ) -> std::result::Result<QueryOutcome, QueryFailure> {
        let mut diagnostics = Diagnostics {
            enhanced: options.enhanced && config.enhanced_enabled,
            ..Default::default()
        };

        // -- Stage 1: context selection ----------------------------------
        let bundle = if self.corpus.is_empty() {
            // No knowledge: skip Context7 entirely and record the reason.
            diagnostics.degraded_reason = Some("knowledge_empty".to_string());
            ContextBundle::default()
        } else if diagnostics.enhanced {
            let mut c7 = config.context7.clone();
            if let Some(limit) = options.context_sources {
                c7.max_sources = limit.max(1);
            }
            let (bundle, analytics) = self.context7.gather(text, None, &c7);
            if bundle.is_empty() {
                debug!("empty Context7 bundle, falling back to baseline top-k");
                diagnostics.fallback_path = Some("baseline_topk".to_string());
                if analytics.all_sources_failed {
                    diagnostics.degraded_reason = Some("context_sources_failed".to_string());
                }
                self.baseline_bundle(text, config, &mut diagnostics)
            } else {
                diagnostics.context_sources_used = bundle.distinct_sources();
                bundle
            }
        } else {
            self.baseline_bundle(text, config, &mut diagnostics)
        };

        // -- Stage 2: sequential thinking --------------------------------
        if config.thinking_enabled {
            let thinking_options = self.thinking_options(options, config);
            match self
                .thinking
                .run(text, &bundle, &thinking_options, &config.thinking, cancel)
                .await
            {
                Ok(outcome) => {
                    diagnostics.thoughts = outcome.trace.thoughts.len();
                    diagnostics.branches = outcome.trace.branch_count;
                    diagnostics.complexity =
                        Some(outcome.trace.complexity.as_str().to_string());
                    if outcome.trace.termination == TerminationReason::Interrupted
                        && diagnostics.degraded_reason.is_none()
                    {
                        diagnostics.degraded_reason = Some("interrupted".to_string());
                    }
                    return Ok(QueryOutcome {
                        answer: outcome.answer,
                        trace: Some(outcome.trace),
                        diagnostics,
                    });
                }
                Err(error @ (CoreError::LlmUnavailable(_) | CoreError::LlmBadReply(_))) => {
                    // -- Stage 3: fall back to the basic path ------------
                    warn!(%error, "thinking engine failed, falling back to basic path");
                    diagnostics.fallback_path = Some("basic".to_string());
                    diagnostics.degraded_reason = Some("thinking_failed".to_string());
                }
                Err(CoreError::Cancelled) => {
                    return Err(QueryFailure { error: CoreError::Cancelled, diagnostics });
                }
                Err(other) => return Err(QueryFailure { error: other, diagnostics }),
            }
        }

        // -- Stage 3/4: basic completion or structured error -------------
        match self
            .basic_completion(text, &bundle, options.model.as_deref(), config, cancel)
            .await
        {
            Ok(answer) => Ok(QueryOutcome { answer, trace: None, diagnostics }),
            Err(error) => Err(QueryFailure { error, diagnostics }),
        }
    }

    fn baseline_bundle(
        &self,
        text: &str,
        config: &EngineConfig,
        diagnostics: &mut Diagnostics,
    ) -> ContextBundle {
        let mut bundle = ContextBundle::default();
        match self.retriever.retrieve(text, config.context7.per_source_quota) {
            Ok(candidates) => {
                for candidate in candidates {
                    bundle.push_within(candidate, config.context7.token_budget);
                }
            }
            Err(error) => warn!(%error, "baseline retrieval failed"),
        }
        if bundle.is_empty() && diagnostics.degraded_reason.is_none() && self.corpus.is_empty() {
            diagnostics.degraded_reason = Some("knowledge_empty".to_string());
        }
        diagnostics.context_sources_used = bundle.distinct_sources();
        bundle
    }

    async fn basic_completion(
        &self,
        text: &str,
        bundle: &ContextBundle,
        model: Option<&str>,
        config: &EngineConfig,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let mut context = String::new();
        for entry in &bundle.entries {
            context.push_str(&format!("[{}] {}\n", entry.source_id, entry.snippet));
        }
        if context.is_empty() {
            context.push_str("(no retrieved context)\n");
        }

        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system(
                    "Answer the question using the provided context where relevant. \
                     Cite context ids in square brackets when you rely on them.",
                ),
                ChatMessage::user(format!("Context:\n{context}\nQuestion: {text}")),
            ],
            model: model.unwrap_or(&config.llm.model).to_string(),
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
        };
        Ok(self.gateway.complete(&request, cancel).await?.text)
    }

    fn thinking_options(&self, options: &QueryOptions, config: &EngineConfig) -> ThinkingOptions {
        ThinkingOptions {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| config.llm.model.clone()),
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            max_thoughts: options.max_thoughts,
            branch_cap: options.branch_cap,
        }
    }
}

fn validate_query(text: &str) -> std::result::Result<(), QueryFailure> {
    if text.trim().is_empty() {
        return Err(QueryFailure::from(CoreError::InvalidArgument(
            "query must not be empty".to_string(),
        )));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
