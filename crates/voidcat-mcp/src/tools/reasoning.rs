//! Reasoning pipeline tools.
//!
//! Five tools front the coordinator: the enhanced pipeline, the basic
//! pipeline, sequential-only thinking, the status snapshot, and runtime
//! configuration.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use voidcat_core::{ConfigPatch, CoreError, QueryOptions};

use crate::context::AppContext;
use crate::http::events::ChangeEvent;

use super::parse_args;

// ============================================================================
// ENHANCED QUERY
// ============================================================================

pub fn enhanced_query_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Natural-language question"
            },
            "model": {
                "type": "string",
                "description": "Override the configured model"
            },
            "enhanced": {
                "type": "boolean",
                "description": "Use Context7 selection (default true)",
                "default": true
            },
            "maxThoughts": {
                "type": "integer",
                "description": "Cap on reasoning thoughts",
                "minimum": 2,
                "maximum": 20
            },
            "branchCap": {
                "type": "integer",
                "description": "Cap on reasoning branches",
                "minimum": 1,
                "maximum": 4
            },
            "contextSources": {
                "type": "integer",
                "description": "Cap on retrieval sources consulted",
                "minimum": 1
            },
            "includeTrace": {
                "type": "boolean",
                "description": "Return the full thought trace (default true)",
                "default": true
            },
            "timeoutMs": {
                "type": "integer",
                "description": "Overall timeout; on expiry a partial marked 'timeout' is returned",
                "minimum": 1
            }
        },
        "required": ["query"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnhancedQueryArgs {
    query: String,
    model: Option<String>,
    enhanced: Option<bool>,
    #[serde(alias = "max_thoughts")]
    max_thoughts: Option<usize>,
    #[serde(alias = "branch_cap")]
    branch_cap: Option<usize>,
    #[serde(alias = "context_sources")]
    context_sources: Option<usize>,
    #[serde(alias = "include_trace")]
    include_trace: Option<bool>,
    #[serde(alias = "timeout_ms")]
    timeout_ms: Option<u64>,
}

pub async fn execute_enhanced_query(
    ctx: Arc<AppContext>,
    arguments: Option<Value>,
) -> Result<Value, CoreError> {
    let args: EnhancedQueryArgs = parse_args(arguments)?;
    let options = QueryOptions {
        enhanced: args.enhanced.unwrap_or(true),
        max_thoughts: args.max_thoughts,
        branch_cap: args.branch_cap,
        context_sources: args.context_sources,
        include_trace: args.include_trace.unwrap_or(true),
        timeout_ms: args.timeout_ms,
        model: args.model,
    };

    let outcome = ctx
        .coordinator
        .query(&args.query, &options)
        .await
        .map_err(|failure| failure.error)?;

    Ok(serde_json::json!({
        "answer": outcome.answer,
        "trace": outcome.trace,
        "diagnostics": outcome.diagnostics,
    }))
}

// ============================================================================
// BASIC QUERY
// ============================================================================

pub fn basic_query_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Natural-language question"
            },
            "model": {
                "type": "string",
                "description": "Override the configured model"
            }
        },
        "required": ["query"]
    })
}

#[derive(Debug, Deserialize)]
struct BasicQueryArgs {
    query: String,
    model: Option<String>,
}

pub async fn execute_basic_query(
    ctx: Arc<AppContext>,
    arguments: Option<Value>,
) -> Result<Value, CoreError> {
    let args: BasicQueryArgs = parse_args(arguments)?;
    let outcome = ctx
        .coordinator
        .query_basic(&args.query, args.model.as_deref())
        .await
        .map_err(|failure| failure.error)?;
    Ok(serde_json::json!({
        "answer": outcome.answer,
        "diagnostics": outcome.diagnostics,
    }))
}

// ============================================================================
// SEQUENTIAL THINKING
// ============================================================================

pub fn sequential_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Problem to reason through"
            },
            "maxThoughts": {
                "type": "integer",
                "minimum": 2,
                "maximum": 20
            },
            "branchCap": {
                "type": "integer",
                "minimum": 1,
                "maximum": 4
            }
        },
        "required": ["query"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SequentialArgs {
    query: String,
    #[serde(alias = "max_thoughts")]
    max_thoughts: Option<usize>,
    #[serde(alias = "branch_cap")]
    branch_cap: Option<usize>,
}

pub async fn execute_sequential(
    ctx: Arc<AppContext>,
    arguments: Option<Value>,
) -> Result<Value, CoreError> {
    let args: SequentialArgs = parse_args(arguments)?;
    let options = QueryOptions {
        max_thoughts: args.max_thoughts,
        branch_cap: args.branch_cap,
        ..QueryOptions::default()
    };
    let outcome = ctx
        .coordinator
        .sequential_only(&args.query, &options)
        .await
        .map_err(|failure| failure.error)?;
    Ok(serde_json::json!({
        "answer": outcome.answer,
        "trace": outcome.trace,
        "diagnostics": outcome.diagnostics,
    }))
}

// ============================================================================
// STATUS
// ============================================================================

pub fn status_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

pub async fn execute_status(
    ctx: Arc<AppContext>,
    _arguments: Option<Value>,
) -> Result<Value, CoreError> {
    let engine = ctx.coordinator.diagnostics().await;
    let tasks = ctx.tasks.stats().await?;
    let memories = ctx.memories.count().await;
    Ok(serde_json::json!({
        "status": engine.status,
        "engine": engine,
        "tasks": tasks,
        "memories": { "total": memories },
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ============================================================================
// CONFIGURE
// ============================================================================

pub fn configure_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "description": "Partial engine configuration; absent fields are untouched",
        "properties": {
            "enhanced_enabled": { "type": "boolean" },
            "thinking_enabled": { "type": "boolean" },
            "intent_weight": { "type": "number" },
            "recency_weight": { "type": "number" },
            "cluster_weight": { "type": "number" },
            "cluster_threshold": { "type": "number" },
            "per_source_quota": { "type": "integer", "minimum": 1 },
            "max_sources": { "type": "integer", "minimum": 1 },
            "max_per_cluster": { "type": "integer", "minimum": 1 },
            "min_sources": { "type": "integer", "minimum": 1 },
            "token_budget": { "type": "integer", "minimum": 1 },
            "revision_cap": { "type": "integer", "minimum": 0 },
            "confidence_floor": { "type": "number" },
            "split_threshold": { "type": "number" },
            "length_weight": { "type": "number" },
            "conjunction_weight": { "type": "number" },
            "cue_weight": { "type": "number" },
            "noun_weight": { "type": "number" },
            "domain_weight": { "type": "number" },
            "model": { "type": "string" },
            "max_tokens": { "type": "integer", "minimum": 1 },
            "temperature": { "type": "number" },
            "max_attempts": { "type": "integer", "minimum": 1 },
            "llm_concurrency": { "type": "integer", "minimum": 1 }
        }
    })
}

pub async fn execute_configure(
    ctx: Arc<AppContext>,
    arguments: Option<Value>,
) -> Result<Value, CoreError> {
    let patch: ConfigPatch = parse_args(arguments)?;
    let config = ctx.coordinator.configure(&patch).await;
    ctx.emit(ChangeEvent::system("configured", serde_json::json!({})));
    Ok(serde_json::to_value(config)?)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testutil::{context_with, freedonia_context, EchoBackend, OfflineBackend};

    #[tokio::test]
    async fn test_enhanced_query_answers_from_knowledge() {
        let (ctx, _dir) = freedonia_context().await;
        let result = execute_enhanced_query(
            ctx,
            Some(serde_json::json!({ "query": "What is the capital of Freedonia?" })),
        )
        .await
        .unwrap();

        assert!(result["answer"].as_str().unwrap().contains("Lakeview"));
        assert!(result["diagnostics"]["context_sources_used"].as_u64().unwrap() >= 1);
        assert!(result["trace"].is_object());
    }

    #[tokio::test]
    async fn test_enhanced_query_empty_kb_is_degraded_success() {
        let (ctx, _dir) = context_with(Arc::new(EchoBackend), vec![]).await;
        let result = execute_enhanced_query(
            ctx,
            Some(serde_json::json!({ "query": "What is the capital of Freedonia?" })),
        )
        .await
        .unwrap();
        assert_eq!(result["diagnostics"]["degraded_reason"], "knowledge_empty");
    }

    #[tokio::test]
    async fn test_enhanced_query_requires_query_field() {
        let (ctx, _dir) = freedonia_context().await;
        let error = execute_enhanced_query(ctx, Some(serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(error, CoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_enhanced_query_llm_offline_maps_to_unavailable() {
        let (ctx, _dir) = context_with(
            Arc::new(OfflineBackend),
            vec![("facts.md", "some knowledge")],
        )
        .await;
        let error = execute_enhanced_query(
            ctx,
            Some(serde_json::json!({ "query": "some knowledge question" })),
        )
        .await
        .unwrap_err();
        assert_eq!(error.wire_code(), "LLM_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_sequential_thinking_returns_trace() {
        let (ctx, _dir) = context_with(Arc::new(EchoBackend), vec![]).await;
        let result = execute_sequential(
            ctx,
            Some(serde_json::json!({ "query": "what is 2 plus 2", "maxThoughts": 5 })),
        )
        .await
        .unwrap();
        let thoughts = result["trace"]["thoughts"].as_array().unwrap();
        assert!(!thoughts.is_empty());
        for thought in thoughts {
            assert!(thought["stage"].is_string());
            assert!(thought["confidence"].is_number());
        }
    }

    #[tokio::test]
    async fn test_status_aggregates_engine_and_stores() {
        let (ctx, _dir) = freedonia_context().await;
        let result = execute_status(ctx, None).await.unwrap();
        assert_eq!(result["status"], "ok");
        assert_eq!(result["engine"]["documents"], 1);
        assert_eq!(result["tasks"]["total"], 0);
        assert_eq!(result["memories"]["total"], 0);
    }

    #[tokio::test]
    async fn test_configure_patches_and_returns_config() {
        let (ctx, _dir) = freedonia_context().await;
        let result = execute_configure(
            ctx.clone(),
            Some(serde_json::json!({ "cluster_threshold": 0.9, "enhanced_enabled": false })),
        )
        .await
        .unwrap();
        // f32 widens through JSON; compare with tolerance.
        let threshold = result["context7"]["cluster_threshold"].as_f64().unwrap();
        assert!((threshold - 0.9).abs() < 1e-6);
        assert_eq!(result["enhanced_enabled"], false);
    }

    #[tokio::test]
    async fn test_configure_rejects_unknown_knob() {
        let (ctx, _dir) = freedonia_context().await;
        let error = execute_configure(ctx, Some(serde_json::json!({ "no_such_knob": 1 })))
            .await
            .unwrap_err();
        assert!(matches!(error, CoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_basic_query_omits_trace() {
        let (ctx, _dir) = freedonia_context().await;
        let result = execute_basic_query(
            ctx,
            Some(serde_json::json!({ "query": "capital of Freedonia" })),
        )
        .await
        .unwrap();
        assert!(result.get("trace").is_none());
        assert!(result["answer"].is_string());
    }
}
