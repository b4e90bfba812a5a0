//! MCP server core.
//!
//! Routes JSON-RPC requests to the tool registry. The server is shared
//! across concurrently executing requests, so its only mutable state is
//! the initialization flag.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::AppContext;
use crate::protocol::messages::{
    CallToolRequest, CallToolResult, InitializeRequest, InitializeResult, ListToolsResult,
    ServerCapabilities, ServerInfo,
};
use crate::protocol::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_VERSION};
use crate::tools::ToolRegistry;

/// MCP server implementation.
pub struct McpServer {
    ctx: Arc<AppContext>,
    registry: ToolRegistry,
    initialized: AtomicBool,
}

impl McpServer {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            ctx,
            registry: ToolRegistry::builtin(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Handle one JSON-RPC request. Notifications return `None`.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let request_id = Uuid::new_v4();
        debug!(%request_id, method = %request.method, "handling request");

        if !self.initialized.load(Ordering::Acquire)
            && request.method != "initialize"
            && request.method != "notifications/initialized"
        {
            warn!(method = %request.method, "rejecting request: server not initialized");
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::server_not_initialized(),
            ));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "notifications/initialized" => return None,
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            "shutdown" => {
                info!("shutdown requested");
                Ok(serde_json::json!({}))
            }
            method => {
                warn!("unknown method: {method}");
                Err(JsonRpcError::method_not_found(method))
            }
        };

        Some(match result {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(error) => JsonRpcResponse::error(request.id, error),
        })
    }

    fn handle_initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let request: InitializeRequest = match params {
            Some(p) => serde_json::from_value(p)
                .map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => InitializeRequest::default(),
        };

        // Use the client's version when it is older; newer clients get ours.
        let negotiated = if request.protocol_version.as_str() < MCP_VERSION {
            request.protocol_version.clone()
        } else {
            MCP_VERSION.to_string()
        };

        self.initialized.store(true, Ordering::Release);
        info!(protocol = %negotiated, "MCP session initialized");

        let result = InitializeResult {
            protocol_version: negotiated,
            server_info: ServerInfo {
                name: "voidcat-reasoning-core".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: ServerCapabilities {
                tools: {
                    let mut map = HashMap::new();
                    map.insert("listChanged".to_string(), serde_json::json!(false));
                    map
                },
            },
            instructions: Some(
                "VoidCat is a reasoning server over a local markdown knowledge base. Use \
                 voidcat_enhanced_query for grounded answers, voidcat_sequential_thinking for \
                 pure multi-step reasoning, and the task/memory tools to track work and notes \
                 across sessions."
                    .to_string(),
            ),
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<Value, JsonRpcError> {
        let result = ListToolsResult { tools: self.registry.descriptions() };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let request: CallToolRequest = match params {
            Some(p) => serde_json::from_value(p)
                .map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("missing tool call parameters")),
        };

        if !self.registry.contains(&request.name) {
            return Err(JsonRpcError::method_not_found(&format!(
                "unknown tool: {}",
                request.name
            )));
        }

        match self
            .registry
            .dispatch(Arc::clone(&self.ctx), &request.name, request.arguments)
            .await
        {
            Ok(value) => {
                let result = CallToolResult::text(&value);
                serde_json::to_value(result)
                    .map_err(|e| JsonRpcError::internal_error(&e.to_string()))
            }
            Err(error) => {
                warn!(tool = %request.name, %error, "tool call failed");
                Err(JsonRpcError::from_core(&error))
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
