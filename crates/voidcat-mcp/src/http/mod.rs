//! HTTP gateway.
//!
//! Thin REST facade over the coordinator and the task/memory substrate,
//! plus a WebSocket change broadcast for editor clients.

pub mod events;
pub mod handlers;
pub mod state;
pub mod websocket;

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use state::AppState;

/// Build the axum router with every gateway route.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Core endpoints
        .route("/health", get(handlers::health))
        .route("/diagnostics", get(handlers::diagnostics))
        .route("/query", post(handlers::query))
        // Editor-facing API
        .route("/vscode/api/v1/system/status", get(handlers::system_status))
        .route(
            "/vscode/api/v1/system/recommendations",
            get(handlers::system_recommendations),
        )
        .route(
            "/vscode/api/v1/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route(
            "/vscode/api/v1/tasks/{id}",
            get(handlers::get_task)
                .put(handlers::update_task)
                .delete(handlers::delete_task),
        )
        .route(
            "/vscode/api/v1/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route(
            "/vscode/api/v1/projects/{id}",
            get(handlers::get_project).delete(handlers::delete_project),
        )
        .route(
            "/vscode/api/v1/memories",
            get(handlers::list_memories).post(handlers::create_memory),
        )
        .route("/vscode/api/v1/memories/search", post(handlers::search_memories))
        .route("/vscode/api/v1/ws", get(websocket::ws_handler))
        .layer(ServiceBuilder::new().concurrency_limit(64).layer(cors))
        .with_state(state)
}

/// Serve the gateway until the process exits.
pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP gateway listening on {addr}");
    axum::serve(listener, app).await
}

// ============================================================================
// TESTS
// ============================================================================
