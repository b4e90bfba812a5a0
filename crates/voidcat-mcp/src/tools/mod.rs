//! Tool registry.
//!
//! Every tool declares a unique name, a human description, a JSON schema
//! for its arguments, and a handler. Tools are registered explicitly at
//! startup; dispatch validates arguments before the handler runs. No
//! runtime reflection anywhere.

pub mod memories;
pub mod reasoning;
pub mod tasks;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use voidcat_core::CoreError;

use crate::context::AppContext;
use crate::protocol::messages::ToolDescription;

/// Boxed async tool handler.
pub type ToolHandler = Box<
    dyn Fn(Arc<AppContext>, Option<Value>) -> BoxFuture<'static, Result<Value, CoreError>>
        + Send
        + Sync,
>;

/// One registered tool.
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: Value,
    handler: ToolHandler,
}

/// Name-keyed registry of `(schema, handler)` pairs.
pub struct ToolRegistry {
    tools: Vec<ToolDef>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    /// The full built-in tool set: reasoning pipeline plus the
    /// task/memory substrate.
    pub fn builtin() -> Self {
        let mut registry = Self { tools: Vec::new(), index: HashMap::new() };

        // -- Reasoning ----------------------------------------------------
        registry.register(
            "voidcat_enhanced_query",
            "Full reasoning pipeline: Context7 retrieval over the knowledge base, sequential \
             thinking, and a grounded answer with diagnostics.",
            reasoning::enhanced_query_schema(),
            handler(reasoning::execute_enhanced_query),
        );
        registry.register(
            "voidcat_basic_query",
            "Baseline pipeline: top-k retrieval plus a single completion. No thinking engine.",
            reasoning::basic_query_schema(),
            handler(reasoning::execute_basic_query),
        );
        registry.register(
            "voidcat_sequential_thinking",
            "Sequential thinking over no retrieval context. Returns the answer and the full \
             thought trace.",
            reasoning::sequential_schema(),
            handler(reasoning::execute_sequential),
        );
        registry.register(
            "voidcat_status",
            "Engine health snapshot: corpus size, LLM backend, toggles, and task/memory totals.",
            reasoning::status_schema(),
            handler(reasoning::execute_status),
        );
        registry.register(
            "voidcat_configure",
            "Patch runtime engine configuration (retrieval weights, thinking budgets, LLM \
             settings). Absent fields are left untouched.",
            reasoning::configure_schema(),
            handler(reasoning::execute_configure),
        );

        // -- Tasks --------------------------------------------------------
        registry.register(
            "voidcat_create_task",
            "Create a task. Assigns an id when absent; rejects cyclic parents.",
            tasks::create_schema(),
            handler(tasks::execute_create),
        );
        registry.register(
            "voidcat_update_task",
            "Partially update a task. Reopening a completed task requires force=true.",
            tasks::update_schema(),
            handler(tasks::execute_update),
        );
        registry.register(
            "voidcat_move_task",
            "Re-parent a task. Rejects moves that would create a cycle.",
            tasks::move_schema(),
            handler(tasks::execute_move),
        );
        registry.register(
            "voidcat_delete_task",
            "Delete a task. Without cascade=true a task with children is a conflict.",
            tasks::delete_schema(),
            handler(tasks::execute_delete),
        );
        registry.register(
            "voidcat_list_tasks",
            "List tasks with status, priority-range, project, free-text, and tag filters. \
             Stable ordering: priority desc, then creation time.",
            tasks::list_schema(),
            handler(tasks::execute_list),
        );
        registry.register(
            "voidcat_task_stats",
            "Aggregate task statistics: totals, by-status counts, completion rate, average \
             completion hours.",
            tasks::stats_schema(),
            handler(tasks::execute_stats),
        );

        // -- Memories -----------------------------------------------------
        registry.register(
            "voidcat_store_memory",
            "Store a categorized memory. The category must be a known or registered one.",
            memories::store_schema(),
            handler(memories::execute_store),
        );
        registry.register(
            "voidcat_search_memory",
            "Search memories by substring and tag, optionally within one category.",
            memories::search_schema(),
            handler(memories::execute_search),
        );
        registry.register(
            "voidcat_list_categories",
            "List memory categories: built-in defaults unioned with registered ones.",
            memories::list_categories_schema(),
            handler(memories::execute_list_categories),
        );
        registry.register(
            "voidcat_register_category",
            "Register a new memory category. Idempotent.",
            memories::register_category_schema(),
            handler(memories::execute_register_category),
        );

        registry
    }

    fn register(
        &mut self,
        name: &'static str,
        description: &'static str,
        schema: Value,
        handler: ToolHandler,
    ) {
        debug_assert!(!self.index.contains_key(name), "duplicate tool: {name}");
        self.index.insert(name, self.tools.len());
        self.tools.push(ToolDef { name, description, schema, handler });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registry entries for `tools/list`.
    pub fn descriptions(&self) -> Vec<ToolDescription> {
        self.tools
            .iter()
            .map(|tool| ToolDescription {
                name: tool.name.to_string(),
                description: tool.description.to_string(),
                input_schema: tool.schema.clone(),
            })
            .collect()
    }

    /// Validate arguments and run the handler. The caller has already
    /// resolved the tool name, so an unknown name here is an internal bug.
    pub async fn dispatch(
        &self,
        ctx: Arc<AppContext>,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<Value, CoreError> {
        let tool = self
            .index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| CoreError::NotFound(format!("tool {name}")))?;
        if let Some(args) = &arguments {
            if !args.is_object() && !args.is_null() {
                return Err(CoreError::InvalidArgument(
                    "arguments must be a JSON object".to_string(),
                ));
            }
        }
        debug!(tool = name, "dispatching tool call");
        (tool.handler)(ctx, arguments).await
    }
}

/// Adapt a plain async fn into a boxed handler.
fn handler<F, Fut>(f: F) -> ToolHandler
where
    F: Fn(Arc<AppContext>, Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, CoreError>> + Send + 'static,
{
    Box::new(move |ctx, args| Box::pin(f(ctx, args)))
}

/// Deserialize tool arguments, treating absent arguments as `{}`.
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Option<Value>) -> Result<T, CoreError> {
    let value = arguments.unwrap_or_else(|| Value::Object(Default::default()));
    serde_json::from_value(value)
        .map_err(|e| CoreError::InvalidArgument(format!("invalid arguments: {e}")))
}

// ============================================================================
// TEST HARNESS
// ============================================================================


// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_has_expected_tools() {
        let registry = ToolRegistry::builtin();
        assert_eq!(registry.len(), 15);
        for name in [
            "voidcat_enhanced_query",
            "voidcat_basic_query",
            "voidcat_sequential_thinking",
            "voidcat_status",
            "voidcat_configure",
            "voidcat_create_task",
            "voidcat_update_task",
            "voidcat_move_task",
            "voidcat_delete_task",
            "voidcat_list_tasks",
            "voidcat_task_stats",
            "voidcat_store_memory",
            "voidcat_search_memory",
            "voidcat_list_categories",
            "voidcat_register_category",
        ] {
            assert!(registry.contains(name), "missing tool {name}");
        }
        assert!(!registry.contains("dashboard_only_command"));
    }

    #[test]
    fn test_descriptions_carry_schemas() {
        let registry = ToolRegistry::builtin();
        for tool in registry.descriptions() {
            assert!(!tool.name.is_empty());
            assert!(!tool.description.is_empty());
            assert_eq!(tool.input_schema["type"], "object");
        }
    }

    #[test]
    fn test_parse_args_defaults_absent_to_empty_object() {
        #[derive(serde::Deserialize)]
        struct NoArgs {}
        assert!(parse_args::<NoArgs>(None).is_ok());
    }

    #[test]
    fn test_parse_args_reports_invalid_argument() {
        #[derive(serde::Deserialize, Debug)]
        struct Needs {
            #[allow(dead_code)]
            query: String,
        }
        let error = parse_args::<Needs>(Some(serde_json::json!({"wrong": 1}))).unwrap_err();
        assert!(matches!(error, CoreError::InvalidArgument(_)));
    }
}
