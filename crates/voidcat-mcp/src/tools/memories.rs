//! Memory substrate tools.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use voidcat_core::{CoreError, MemoryInput};

use crate::context::AppContext;
use crate::http::events::ChangeEvent;

use super::parse_args;

// ============================================================================
// STORE
// ============================================================================

pub fn store_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "category": {
                "type": "string",
                "description": "A default or registered category (default: general)"
            },
            "title": { "type": "string" },
            "content": { "type": "string" },
            "importance": {
                "type": "integer",
                "minimum": 1,
                "maximum": 10,
                "default": 5
            },
            "tags": {
                "type": "array",
                "items": { "type": "string" }
            }
        },
        "required": ["title", "content"]
    })
}

pub async fn execute_store(
    ctx: Arc<AppContext>,
    arguments: Option<Value>,
) -> Result<Value, CoreError> {
    let input: MemoryInput = parse_args(arguments)?;
    let memory = ctx.memories.create(input).await?;
    let body = serde_json::to_value(&memory)?;
    ctx.emit(ChangeEvent::memory("created", body.clone()));
    Ok(body)
}

// ============================================================================
// SEARCH
// ============================================================================

pub fn search_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Substring matched against title, content, and tags"
            },
            "category": {
                "type": "string",
                "description": "Restrict the search to one category"
            }
        },
        "required": ["query"]
    })
}

#[derive(Debug, Deserialize)]
struct SearchMemoryArgs {
    query: String,
    category: Option<String>,
}

pub async fn execute_search(
    ctx: Arc<AppContext>,
    arguments: Option<Value>,
) -> Result<Value, CoreError> {
    let args: SearchMemoryArgs = parse_args(arguments)?;
    let hits = ctx
        .memories
        .search(&args.query, args.category.as_deref())
        .await?;
    Ok(serde_json::json!({
        "total": hits.len(),
        "memories": hits,
    }))
}

// ============================================================================
// CATEGORIES
// ============================================================================

pub fn list_categories_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

pub async fn execute_list_categories(
    ctx: Arc<AppContext>,
    _arguments: Option<Value>,
) -> Result<Value, CoreError> {
    let categories = ctx.memories.list_categories().await;
    Ok(serde_json::json!({ "categories": categories }))
}

pub fn register_category_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "name": {
                "type": "string",
                "description": "Category name; normalized to snake_case"
            }
        },
        "required": ["name"]
    })
}

#[derive(Debug, Deserialize)]
struct RegisterCategoryArgs {
    name: String,
}

pub async fn execute_register_category(
    ctx: Arc<AppContext>,
    arguments: Option<Value>,
) -> Result<Value, CoreError> {
    let args: RegisterCategoryArgs = parse_args(arguments)?;
    let name = ctx.memories.register_category(&args.name).await?;
    ctx.emit(ChangeEvent::memory(
        "category_registered",
        serde_json::json!({ "name": name }),
    ));
    Ok(serde_json::json!({ "registered": name }))
}

// ============================================================================
// TESTS
// ============================================================================
