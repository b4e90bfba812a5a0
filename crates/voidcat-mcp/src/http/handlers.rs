//! REST handlers for the HTTP gateway.
//!
//! Thin facade over the coordinator and the task/memory substrate. Errors
//! come back as `{"error": {"code", "message"}}` with 4xx for client
//! mistakes, 503 for overload or LLM outage, 504 for timeout, and 500 for
//! anything internal.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use voidcat_core::{CoreError, QueryFailure, QueryOptions, TaskFilter};

use crate::context::AppContext;
use crate::http::events::ChangeEvent;
use crate::tools;

use super::state::AppState;

// ============================================================================
// ERROR MAPPING
// ============================================================================

/// Wire error: status + `{"error": {"code", "message"}}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: String,
    message: String,
    diagnostics: Option<Value>,
}

impl ApiError {
    fn busy() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "BUSY".to_string(),
            message: "too many concurrent queries".to_string(),
            diagnostics: None,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        let status = StatusCode::from_u16(error.http_status())
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            code: error.wire_code().to_string(),
            message: error.to_string(),
            diagnostics: None,
        }
    }
}

impl From<QueryFailure> for ApiError {
    fn from(failure: QueryFailure) -> Self {
        let mut error = ApiError::from(failure.error);
        error.diagnostics = serde_json::to_value(&failure.diagnostics).ok();
        error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": { "code": self.code, "message": self.message }
        });
        if let Some(diagnostics) = self.diagnostics {
            body["diagnostics"] = diagnostics;
        }
        (self.status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

// ============================================================================
// CORE ENDPOINTS
// ============================================================================

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn diagnostics(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.ctx.coordinator.diagnostics().await;
    Json(serde_json::to_value(snapshot).unwrap_or_default())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryBody {
    query: String,
    model: Option<String>,
    enhanced: Option<bool>,
    #[serde(alias = "max_thoughts")]
    max_thoughts: Option<usize>,
    #[serde(alias = "include_trace")]
    include_trace: Option<bool>,
    #[serde(alias = "timeout_ms")]
    timeout_ms: Option<u64>,
}

pub async fn query(State(state): State<AppState>, Json(body): Json<QueryBody>) -> ApiResult {
    // Back-pressure: bounded concurrency, excess rejected with 503 busy.
    let Ok(_permit) = state.query_limit.try_acquire() else {
        warn!("query rejected: concurrency limit reached");
        return Err(ApiError::busy());
    };

    let options = QueryOptions {
        enhanced: body.enhanced.unwrap_or(true),
        max_thoughts: body.max_thoughts,
        include_trace: body.include_trace.unwrap_or(false),
        timeout_ms: body.timeout_ms,
        model: body.model,
        ..QueryOptions::default()
    };
    let outcome = state.ctx.coordinator.query(&body.query, &options).await?;
    Ok(Json(json!({
        "response": outcome.answer,
        "trace": outcome.trace,
        "diagnostics": outcome.diagnostics,
    })))
}

// ============================================================================
// TASKS
// ============================================================================

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(filter): Query<TaskFilter>,
) -> ApiResult {
    let tasks = state.ctx.tasks.list(&filter).await?;
    Ok(Json(json!({ "total": tasks.len(), "tasks": tasks })))
}

pub async fn create_task(State(state): State<AppState>, Json(body): Json<Value>) -> ApiResult {
    let created = tools::tasks::execute_create(ctx(&state), Some(body)).await?;
    Ok(Json(created))
}

pub async fn get_task(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let task = state.ctx.tasks.get(&id).await?;
    Ok(Json(serde_json::to_value(task).map_err(CoreError::from)?))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut body): Json<Value>,
) -> ApiResult {
    if let Some(object) = body.as_object_mut() {
        object.insert("id".to_string(), json!(id));
    }
    let updated = tools::tasks::execute_update(ctx(&state), Some(body)).await?;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    cascade: bool,
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> ApiResult {
    let deleted = tools::tasks::execute_delete(
        ctx(&state),
        Some(json!({ "id": id, "cascade": params.cascade })),
    )
    .await?;
    Ok(Json(deleted))
}

// ============================================================================
// PROJECTS
// ============================================================================

pub async fn list_projects(State(state): State<AppState>) -> ApiResult {
    let projects = state.ctx.tasks.list_projects().await?;
    Ok(Json(json!({ "total": projects.len(), "projects": projects })))
}

#[derive(Debug, Deserialize)]
pub struct ProjectBody {
    name: String,
    #[serde(default)]
    description: String,
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(body): Json<ProjectBody>,
) -> ApiResult {
    let project = state.ctx.tasks.create_project(&body.name, &body.description).await?;
    let value = serde_json::to_value(&project).map_err(CoreError::from)?;
    state.ctx.emit(ChangeEvent::task("project_created", value.clone()));
    Ok(Json(value))
}

pub async fn get_project(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let project = state.ctx.tasks.get_project(&id).await?;
    Ok(Json(serde_json::to_value(project).map_err(CoreError::from)?))
}

pub async fn delete_project(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    state.ctx.tasks.delete_project(&id).await?;
    state.ctx.emit(ChangeEvent::task("project_deleted", json!({ "id": id })));
    Ok(Json(json!({ "deleted": id })))
}

// ============================================================================
// MEMORIES
// ============================================================================

pub async fn list_memories(State(state): State<AppState>) -> ApiResult {
    let memories = state.ctx.memories.recent(50).await;
    Ok(Json(json!({ "total": memories.len(), "memories": memories })))
}

pub async fn create_memory(State(state): State<AppState>, Json(body): Json<Value>) -> ApiResult {
    let created = tools::memories::execute_store(ctx(&state), Some(body)).await?;
    Ok(Json(created))
}

pub async fn search_memories(State(state): State<AppState>, Json(body): Json<Value>) -> ApiResult {
    let hits = tools::memories::execute_search(ctx(&state), Some(body)).await?;
    Ok(Json(hits))
}

// ============================================================================
// SYSTEM
// ============================================================================

pub async fn system_status(State(state): State<AppState>) -> ApiResult {
    let status = tools::reasoning::execute_status(ctx(&state), None).await?;
    Ok(Json(status))
}

pub async fn system_recommendations(State(state): State<AppState>) -> ApiResult {
    let stats = state.ctx.tasks.stats().await?;
    let engine = state.ctx.coordinator.diagnostics().await;

    let mut recommendations: Vec<String> = Vec::new();
    if stats.blocked > 0 {
        recommendations.push(format!(
            "{} task(s) are blocked; review their dependencies",
            stats.blocked
        ));
    }
    if stats.total > 0 && stats.completion_rate < 0.25 {
        recommendations
            .push("completion rate is under 25%; consider narrowing scope".to_string());
    }
    if engine.documents == 0 {
        recommendations.push(
            "knowledge base is empty; queries will run without retrieved context".to_string(),
        );
    }
    if recommendations.is_empty() {
        recommendations.push("all clear".to_string());
    }
    Ok(Json(json!({ "recommendations": recommendations })))
}

fn ctx(state: &AppState) -> Arc<AppContext> {
    Arc::clone(&state.ctx)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testutil::{context_with, freedonia_context, EchoBackend, OfflineBackend};

    fn state(ctx: Arc<AppContext>) -> AppState {
        AppState::new(ctx, 2)
    }

    #[tokio::test]
    async fn test_health_shape() {
        let body = health().await.0;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_query_round_trip() {
        let (ctx, _dir) = freedonia_context().await;
        let body: QueryBody = serde_json::from_value(json!({
            "query": "What is the capital of Freedonia?"
        }))
        .unwrap();
        let response = query(State(state(ctx)), Json(body)).await.unwrap().0;
        assert!(response["response"].as_str().unwrap().contains("Lakeview"));
        assert!(response["diagnostics"]["context_sources_used"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_query_llm_offline_maps_to_503() {
        let (ctx, _dir) = context_with(
            Arc::new(OfflineBackend),
            vec![("facts.md", "some knowledge")],
        )
        .await;
        let body: QueryBody =
            serde_json::from_value(json!({ "query": "about knowledge" })).unwrap();
        let error = query(State(state(ctx)), Json(body)).await.unwrap_err();
        assert_eq!(error.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.code, "LLM_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_query_empty_is_400() {
        let (ctx, _dir) = context_with(Arc::new(EchoBackend), vec![]).await;
        let body: QueryBody = serde_json::from_value(json!({ "query": "" })).unwrap();
        let error = query(State(state(ctx)), Json(body)).await.unwrap_err();
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_busy_when_limit_exhausted() {
        let (ctx, _dir) = freedonia_context().await;
        let state = state(ctx);
        // Hold every permit so the next query is rejected.
        let _held = state.query_limit.clone().try_acquire_many_owned(2).unwrap();
        let body: QueryBody = serde_json::from_value(json!({ "query": "x" })).unwrap();
        let error = query(State(state), Json(body)).await.unwrap_err();
        assert_eq!(error.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.code, "BUSY");
    }

    #[tokio::test]
    async fn test_task_crud_via_handlers() {
        let (ctx, _dir) = context_with(Arc::new(EchoBackend), vec![]).await;
        let app = state(ctx);

        let created = create_task(
            State(app.clone()),
            Json(json!({ "name": "via http", "priority": 7 })),
        )
        .await
        .unwrap()
        .0;
        let id = created["id"].as_str().unwrap().to_string();

        let fetched = get_task(State(app.clone()), Path(id.clone())).await.unwrap().0;
        assert_eq!(fetched["name"], "via http");

        let updated = update_task(
            State(app.clone()),
            Path(id.clone()),
            Json(json!({ "status": "completed" })),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(updated["status"], "completed");

        delete_task(
            State(app.clone()),
            Path(id.clone()),
            Query(DeleteParams { cascade: false }),
        )
        .await
        .unwrap();
        let error = get_task(State(app), Path(id)).await.unwrap_err();
        assert_eq!(error.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cycle_conflict_maps_to_409() {
        let (ctx, _dir) = context_with(Arc::new(EchoBackend), vec![]).await;
        let app = state(ctx.clone());
        let a = create_task(State(app.clone()), Json(json!({ "name": "A" })))
            .await
            .unwrap()
            .0;
        let a_id = a["id"].as_str().unwrap();
        let b = create_task(State(app.clone()), Json(json!({ "name": "B", "parentId": a_id })))
            .await
            .unwrap()
            .0;
        let b_id = b["id"].as_str().unwrap();

        let error = tools::tasks::execute_move(
            ctx,
            Some(json!({ "id": a_id, "newParentId": b_id })),
        )
        .await
        .map_err(ApiError::from)
        .unwrap_err();
        assert_eq!(error.status, StatusCode::CONFLICT);
        assert_eq!(error.code, "CYCLE");
    }

    #[tokio::test]
    async fn test_memories_endpoints() {
        let (ctx, _dir) = context_with(Arc::new(EchoBackend), vec![]).await;
        let app = state(ctx);
        create_memory(
            State(app.clone()),
            Json(json!({ "title": "note", "content": "remember the milk" })),
        )
        .await
        .unwrap();

        let listed = list_memories(State(app.clone())).await.unwrap().0;
        assert_eq!(listed["total"], 1);

        let hits = search_memories(State(app), Json(json!({ "query": "milk" })))
            .await
            .unwrap()
            .0;
        assert_eq!(hits["total"], 1);
    }

    #[tokio::test]
    async fn test_system_endpoints() {
        let (ctx, _dir) = context_with(Arc::new(EchoBackend), vec![]).await;
        let app = state(ctx);
        let status = system_status(State(app.clone())).await.unwrap().0;
        assert!(status["engine"].is_object());

        let recs = system_recommendations(State(app)).await.unwrap().0;
        let list = recs["recommendations"].as_array().unwrap();
        assert!(list.iter().any(|r| r.as_str().unwrap().contains("knowledge base is empty")));
    }
}
