//! # VoidCat Core
//!
//! Agent-side reasoning engine: given a natural-language query, retrieve
//! relevant snippets from a local markdown knowledge base, run a
//! multi-stage reasoning pipeline over them, consult an LLM backend, and
//! return a grounded answer plus a diagnostic trace.
//!
//! The pipeline composes five pieces:
//!
//! - **Knowledge store**: markdown corpus with a TF-IDF index rebuilt on
//!   startup, searched by cosine similarity.
//! - **Context7 engine**: multi-source, relevance-scored, cluster-coherent
//!   context selection under a token budget.
//! - **Sequential thinking engine**: complexity-adaptive, branching
//!   reasoning with an auditable thought DAG.
//! - **LLM gateway**: provider-agnostic chat completions with retry,
//!   back-pressure, and cooperative cancellation.
//! - **Coordinator**: composes the above with a graceful fallback chain.
//!
//! Alongside the pipeline lives the task/memory substrate: persistent
//! hierarchical tasks and categorized memories backed by atomic-rename
//! JSON documents.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use voidcat_core::prelude::*;
//!
//! let corpus = Arc::new(Corpus::load(Path::new("knowledge"), &config.knowledge)?);
//! let backend = Arc::new(OpenAiBackend::new(api_key, None));
//! let gateway = Arc::new(LlmGateway::new(backend, &config.llm));
//! let coordinator = Coordinator::new(corpus, gateway, config);
//!
//! let outcome = coordinator.query("What is a context bundle?", &QueryOptions::default()).await?;
//! println!("{}", outcome.answer);
//! ```

// ============================================================================
// MODULES
// ============================================================================

pub mod config;
pub mod context7;
pub mod coordinator;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod retrieval;
pub mod store;
pub mod thinking;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use config::{ConfigPatch, Context7Config, EngineConfig, KnowledgeConfig, LlmConfig, ThinkingConfig};
pub use context7::{Context7Engine, QueryAnalysis, QueryIntent, SelectionAnalytics};
pub use coordinator::{
    Coordinator, Diagnostics, QueryFailure, QueryOptions, QueryOutcome, StatusSnapshot,
};
pub use error::{ConflictKind, CoreError, Result};
pub use knowledge::{Corpus, Document, SearchHit, SparseVector, TfIdfModel};
pub use llm::{
    ChatBackend, ChatMessage, Completion, CompletionRequest, LlmGateway, OpenAiBackend, Role,
};
pub use retrieval::{estimate_tokens, BaselineRetriever, ContextBundle, ContextCandidate};
pub use store::{
    Memory, MemoryInput, MemoryStore, Project, Task, TaskDelta, TaskFilter, TaskStats,
    TaskStatus, TaskStore, DEFAULT_CATEGORIES,
};
pub use thinking::{
    Complexity, ReasoningTrace, TerminationReason, ThinkingEngine, ThinkingOptions, Thought,
    ThoughtBudget, ThoughtId, ThoughtStage,
};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::{
        ConfigPatch, ContextBundle, Coordinator, CoreError, Corpus, EngineConfig, LlmGateway,
        MemoryStore, OpenAiBackend, QueryOptions, Result, Task, TaskFilter, TaskStatus,
        TaskStore,
    };
}
