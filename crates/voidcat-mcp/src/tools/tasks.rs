//! Task substrate tools.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use voidcat_core::{CoreError, Task, TaskDelta, TaskFilter};

use crate::context::AppContext;
use crate::http::events::ChangeEvent;

use super::parse_args;

// ============================================================================
// CREATE
// ============================================================================

pub fn create_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "name": {
                "type": "string",
                "description": "Task name"
            },
            "description": {
                "type": "string"
            },
            "parentId": {
                "type": "string",
                "description": "Parent task id; the parent graph stays a forest"
            },
            "projectId": {
                "type": "string"
            },
            "priority": {
                "type": "integer",
                "minimum": 1,
                "maximum": 10,
                "default": 5
            },
            "complexity": {
                "type": "integer",
                "minimum": 1,
                "maximum": 10,
                "default": 5
            },
            "estimatedHours": {
                "type": "number"
            },
            "tags": {
                "type": "array",
                "items": { "type": "string" }
            }
        },
        "required": ["name"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskArgs {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(alias = "parent_id")]
    parent_id: Option<String>,
    #[serde(alias = "project_id")]
    project_id: Option<String>,
    priority: Option<u8>,
    complexity: Option<u8>,
    #[serde(alias = "estimated_hours")]
    estimated_hours: Option<f64>,
    #[serde(default)]
    tags: Vec<String>,
}

pub async fn execute_create(
    ctx: Arc<AppContext>,
    arguments: Option<Value>,
) -> Result<Value, CoreError> {
    let args: CreateTaskArgs = parse_args(arguments)?;
    if args.name.trim().is_empty() {
        return Err(CoreError::InvalidArgument("task name must not be empty".into()));
    }

    let mut task = Task::new(args.name);
    task.description = args.description;
    task.parent_id = args.parent_id;
    task.project_id = args.project_id;
    if let Some(priority) = args.priority {
        task.priority = priority;
    }
    if let Some(complexity) = args.complexity {
        task.complexity = complexity;
    }
    task.estimated_hours = args.estimated_hours;
    task.tags = args.tags;

    let created = ctx.tasks.create(task).await?;
    let body = serde_json::to_value(&created)?;
    ctx.emit(ChangeEvent::task("created", body.clone()));
    Ok(body)
}

// ============================================================================
// UPDATE
// ============================================================================

pub fn update_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "name": { "type": "string" },
            "description": { "type": "string" },
            "status": {
                "type": "string",
                "enum": ["pending", "in-progress", "completed", "blocked"]
            },
            "priority": { "type": "integer", "minimum": 1, "maximum": 10 },
            "complexity": { "type": "integer", "minimum": 1, "maximum": 10 },
            "estimatedHours": { "type": ["number", "null"] },
            "actualHours": { "type": ["number", "null"] },
            "tags": { "type": "array", "items": { "type": "string" } },
            "projectId": { "type": ["string", "null"] },
            "force": {
                "type": "boolean",
                "description": "Required for completed -> pending",
                "default": false
            }
        },
        "required": ["id"]
    })
}

#[derive(Debug, Deserialize)]
struct UpdateTaskArgs {
    id: String,
    #[serde(flatten)]
    delta: TaskDelta,
}

pub async fn execute_update(
    ctx: Arc<AppContext>,
    arguments: Option<Value>,
) -> Result<Value, CoreError> {
    let args: UpdateTaskArgs = parse_args(arguments)?;
    let updated = ctx.tasks.update(&args.id, args.delta).await?;
    let body = serde_json::to_value(&updated)?;
    ctx.emit(ChangeEvent::task("updated", body.clone()));
    Ok(body)
}

// ============================================================================
// MOVE
// ============================================================================

pub fn move_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "newParentId": {
                "type": ["string", "null"],
                "description": "New parent id, or null to move to the root"
            }
        },
        "required": ["id"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveTaskArgs {
    id: String,
    #[serde(alias = "new_parent_id")]
    new_parent_id: Option<String>,
}

pub async fn execute_move(
    ctx: Arc<AppContext>,
    arguments: Option<Value>,
) -> Result<Value, CoreError> {
    let args: MoveTaskArgs = parse_args(arguments)?;
    let moved = ctx.tasks.move_task(&args.id, args.new_parent_id).await?;
    let body = serde_json::to_value(&moved)?;
    ctx.emit(ChangeEvent::task("moved", body.clone()));
    Ok(body)
}

// ============================================================================
// DELETE
// ============================================================================

pub fn delete_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "cascade": {
                "type": "boolean",
                "description": "Delete the whole subtree (default false)",
                "default": false
            }
        },
        "required": ["id"]
    })
}

#[derive(Debug, Deserialize)]
struct DeleteTaskArgs {
    id: String,
    #[serde(default)]
    cascade: bool,
}

pub async fn execute_delete(
    ctx: Arc<AppContext>,
    arguments: Option<Value>,
) -> Result<Value, CoreError> {
    let args: DeleteTaskArgs = parse_args(arguments)?;
    let deleted = ctx.tasks.delete(&args.id, args.cascade).await?;
    ctx.emit(ChangeEvent::task(
        "deleted",
        serde_json::json!({ "ids": deleted }),
    ));
    Ok(serde_json::json!({ "deleted": deleted }))
}

// ============================================================================
// LIST
// ============================================================================

pub fn list_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "status": {
                "type": "string",
                "enum": ["pending", "in-progress", "completed", "blocked"]
            },
            "minPriority": { "type": "integer", "minimum": 1, "maximum": 10 },
            "maxPriority": { "type": "integer", "minimum": 1, "maximum": 10 },
            "projectId": { "type": "string" },
            "text": {
                "type": "string",
                "description": "Case-insensitive substring over name and description"
            },
            "tags": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Every listed tag must match"
            }
        }
    })
}

pub async fn execute_list(
    ctx: Arc<AppContext>,
    arguments: Option<Value>,
) -> Result<Value, CoreError> {
    let filter: TaskFilter = parse_args(arguments)?;
    let tasks = ctx.tasks.list(&filter).await?;
    Ok(serde_json::json!({
        "total": tasks.len(),
        "tasks": tasks,
    }))
}

// ============================================================================
// STATS
// ============================================================================

pub fn stats_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

pub async fn execute_stats(
    ctx: Arc<AppContext>,
    _arguments: Option<Value>,
) -> Result<Value, CoreError> {
    let stats = ctx.tasks.stats().await?;
    Ok(serde_json::to_value(stats)?)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testutil::{context_with, EchoBackend};
    use voidcat_core::ConflictKind;

    async fn ctx() -> (Arc<AppContext>, tempfile::TempDir) {
        context_with(Arc::new(EchoBackend), vec![]).await
    }

    #[tokio::test]
    async fn test_create_list_delete_round_trip() {
        let (ctx, _dir) = ctx().await;
        let created = execute_create(
            ctx.clone(),
            Some(serde_json::json!({ "name": "ship release", "priority": 8 })),
        )
        .await
        .unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        let listed = execute_list(ctx.clone(), None).await.unwrap();
        assert_eq!(listed["total"], 1);
        assert_eq!(listed["tasks"][0]["id"], id.as_str());

        execute_delete(ctx.clone(), Some(serde_json::json!({ "id": id })))
            .await
            .unwrap();
        let listed = execute_list(ctx, None).await.unwrap();
        assert_eq!(listed["total"], 0);
    }

    #[tokio::test]
    async fn test_task_hierarchy_cycle_is_rejected() {
        let (ctx, _dir) = ctx().await;
        let a = execute_create(ctx.clone(), Some(serde_json::json!({ "name": "A" })))
            .await
            .unwrap();
        let a_id = a["id"].as_str().unwrap();
        let b = execute_create(
            ctx.clone(),
            Some(serde_json::json!({ "name": "B", "parentId": a_id })),
        )
        .await
        .unwrap();
        let b_id = b["id"].as_str().unwrap();

        let error = execute_move(
            ctx,
            Some(serde_json::json!({ "id": a_id, "newParentId": b_id })),
        )
        .await
        .unwrap_err();
        assert_eq!(error.wire_code(), "CYCLE");
        assert!(matches!(
            error,
            CoreError::Conflict { kind: ConflictKind::Cycle, .. }
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_task_is_not_found() {
        let (ctx, _dir) = ctx().await;
        let error = execute_delete(ctx, Some(serde_json::json!({ "id": "ghost" })))
            .await
            .unwrap_err();
        assert_eq!(error.wire_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_update_status_via_tool() {
        let (ctx, _dir) = ctx().await;
        let created = execute_create(ctx.clone(), Some(serde_json::json!({ "name": "t" })))
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap();

        let updated = execute_update(
            ctx,
            Some(serde_json::json!({ "id": id, "status": "in-progress" })),
        )
        .await
        .unwrap();
        assert_eq!(updated["status"], "in-progress");
    }

    #[tokio::test]
    async fn test_list_filters_by_status_and_text() {
        let (ctx, _dir) = ctx().await;
        execute_create(ctx.clone(), Some(serde_json::json!({ "name": "deploy api" })))
            .await
            .unwrap();
        execute_create(ctx.clone(), Some(serde_json::json!({ "name": "write docs" })))
            .await
            .unwrap();

        let hits = execute_list(
            ctx,
            Some(serde_json::json!({ "status": "pending", "text": "deploy" })),
        )
        .await
        .unwrap();
        assert_eq!(hits["total"], 1);
        assert_eq!(hits["tasks"][0]["name"], "deploy api");
    }

    #[tokio::test]
    async fn test_stats_shape() {
        let (ctx, _dir) = ctx().await;
        execute_create(ctx.clone(), Some(serde_json::json!({ "name": "t" })))
            .await
            .unwrap();
        let stats = execute_stats(ctx, None).await.unwrap();
        assert_eq!(stats["total"], 1);
        assert_eq!(stats["pending"], 1);
        assert!(stats["completionRate"].is_number());
    }

    #[tokio::test]
    async fn test_mutations_broadcast_change_events() {
        let (ctx, _dir) = ctx().await;
        let mut rx = ctx.subscribe();
        execute_create(ctx.clone(), Some(serde_json::json!({ "name": "observable" })))
            .await
            .unwrap();
        let event = rx.try_recv().expect("a task event should be broadcast");
        let value: Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(value["type"], "task");
        assert_eq!(value["payload"]["action"], "created");
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let (ctx, _dir) = ctx().await;
        let error = execute_create(ctx, Some(serde_json::json!({ "name": "  " })))
            .await
            .unwrap_err();
        assert!(matches!(error, CoreError::InvalidArgument(_)));
    }
}
