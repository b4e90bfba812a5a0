//! Engine configuration.
//!
//! Every tunable the pipeline exposes lives here with its default. The
//! coordinator keeps a live copy behind a lock and patches it at runtime
//! through [`ConfigPatch`].

use serde::{Deserialize, Serialize};

/// Knowledge store tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Documents longer than this (in chars) are chunked.
    pub max_doc_chars: usize,
    /// Window size of a chunk, in chars.
    pub chunk_window: usize,
    /// Stride between chunk starts, in chars. Must be <= window.
    pub chunk_stride: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            max_doc_chars: 4000,
            chunk_window: 1200,
            chunk_stride: 800,
        }
    }
}

/// Context7 selection tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context7Config {
    /// Weight of the intent-match bonus (alpha).
    pub intent_weight: f32,
    /// Weight of the recency bonus (beta).
    pub recency_weight: f32,
    /// Weight of the cluster-coherence bonus (gamma).
    pub cluster_weight: f32,
    /// Cosine similarity threshold for single-link cluster merging (tau).
    pub cluster_threshold: f32,
    /// Candidates fetched per retrieval source.
    pub per_source_quota: usize,
    /// Maximum number of expansion sources consulted per query.
    pub max_sources: usize,
    /// Maximum selected candidates per cluster.
    pub max_per_cluster: usize,
    /// Minimum distinct sources in the bundle, when available.
    pub min_sources: usize,
    /// Token budget for the assembled bundle.
    pub token_budget: usize,
}

impl Default for Context7Config {
    fn default() -> Self {
        Self {
            intent_weight: 0.2,
            recency_weight: 0.05,
            cluster_weight: 0.15,
            cluster_threshold: 0.75,
            per_source_quota: 5,
            max_sources: 6,
            max_per_cluster: 2,
            min_sources: 3,
            token_budget: 2000,
        }
    }
}

/// Sequential thinking tunables, including the complexity feature weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingConfig {
    /// Times a branch may re-enter ANALYSIS via REVISION.
    pub revision_cap: u32,
    /// A branch is abandoned after two consecutive thoughts below this.
    pub confidence_floor: f64,
    /// A hypothesis claim above this may open a new branch.
    pub split_threshold: f64,
    /// Prior thoughts included in each stage prompt.
    pub history_window: usize,

    // Complexity assessment feature weights
    pub length_weight: f64,
    pub conjunction_weight: f64,
    pub cue_weight: f64,
    pub noun_weight: f64,
    pub domain_weight: f64,
}

impl Default for ThinkingConfig {
    fn default() -> Self {
        Self {
            revision_cap: 2,
            confidence_floor: 0.35,
            split_threshold: 0.6,
            history_window: 6,
            length_weight: 1.0,
            conjunction_weight: 1.5,
            cue_weight: 2.0,
            noun_weight: 0.5,
            domain_weight: 1.0,
        }
    }
}

/// LLM gateway tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Default model name.
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Base delay of the exponential backoff, in ms.
    pub retry_base_ms: u64,
    /// Backoff cap, in ms.
    pub retry_cap_ms: u64,
    /// Attempts before `LlmUnavailable`.
    pub max_attempts: u32,
    /// Concurrent in-flight completions; excess callers queue.
    pub concurrency: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1024,
            temperature: 0.3,
            retry_base_ms: 250,
            retry_cap_ms: 8_000,
            max_attempts: 4,
            concurrency: 4,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub knowledge: KnowledgeConfig,
    pub context7: Context7Config,
    pub thinking: ThinkingConfig,
    pub llm: LlmConfig,
    /// Runtime toggle for the Context7 engine.
    pub enhanced_enabled: bool,
    /// Runtime toggle for the sequential thinking engine.
    pub thinking_enabled: bool,
    /// Seconds a cached diagnostics snapshot stays fresh.
    pub diagnostics_refresh_secs: u64,
}

impl EngineConfig {
    /// Defaults with both engines enabled.
    pub fn standard() -> Self {
        Self {
            enhanced_enabled: true,
            thinking_enabled: true,
            diagnostics_refresh_secs: 30,
            ..Self::default()
        }
    }
}

/// Partial runtime update applied through `configure`.
///
/// Absent fields leave the current value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigPatch {
    pub enhanced_enabled: Option<bool>,
    pub thinking_enabled: Option<bool>,
    pub intent_weight: Option<f32>,
    pub recency_weight: Option<f32>,
    pub cluster_weight: Option<f32>,
    pub cluster_threshold: Option<f32>,
    pub per_source_quota: Option<usize>,
    pub max_sources: Option<usize>,
    pub max_per_cluster: Option<usize>,
    pub min_sources: Option<usize>,
    pub token_budget: Option<usize>,
    pub revision_cap: Option<u32>,
    pub confidence_floor: Option<f64>,
    pub split_threshold: Option<f64>,
    pub length_weight: Option<f64>,
    pub conjunction_weight: Option<f64>,
    pub cue_weight: Option<f64>,
    pub noun_weight: Option<f64>,
    pub domain_weight: Option<f64>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub max_attempts: Option<u32>,
    pub llm_concurrency: Option<usize>,
}

impl ConfigPatch {
    /// Apply this patch to a configuration in place.
    pub fn apply(&self, config: &mut EngineConfig) {
        macro_rules! set {
            ($field:expr, $target:expr) => {
                if let Some(v) = &$field {
                    $target = v.clone();
                }
            };
        }
        set!(self.enhanced_enabled, config.enhanced_enabled);
        set!(self.thinking_enabled, config.thinking_enabled);
        set!(self.intent_weight, config.context7.intent_weight);
        set!(self.recency_weight, config.context7.recency_weight);
        set!(self.cluster_weight, config.context7.cluster_weight);
        set!(self.cluster_threshold, config.context7.cluster_threshold);
        set!(self.per_source_quota, config.context7.per_source_quota);
        set!(self.max_sources, config.context7.max_sources);
        set!(self.max_per_cluster, config.context7.max_per_cluster);
        set!(self.min_sources, config.context7.min_sources);
        set!(self.token_budget, config.context7.token_budget);
        set!(self.revision_cap, config.thinking.revision_cap);
        set!(self.confidence_floor, config.thinking.confidence_floor);
        set!(self.split_threshold, config.thinking.split_threshold);
        set!(self.length_weight, config.thinking.length_weight);
        set!(self.conjunction_weight, config.thinking.conjunction_weight);
        set!(self.cue_weight, config.thinking.cue_weight);
        set!(self.noun_weight, config.thinking.noun_weight);
        set!(self.domain_weight, config.thinking.domain_weight);
        set!(self.model, config.llm.model);
        set!(self.max_tokens, config.llm.max_tokens);
        set!(self.temperature, config.llm.temperature);
        set!(self.max_attempts, config.llm.max_attempts);
        set!(self.llm_concurrency, config.llm.concurrency);
    }
}

// ============================================================================
// TESTS
// ============================================================================
