//! Server construction and JSON-RPC driving helpers.

use std::sync::Arc;

use tempfile::TempDir;

use voidcat_core::{
    ChatBackend, Corpus, EngineConfig, KnowledgeConfig, LlmConfig, LlmGateway,
};
use voidcat_mcp::context::AppContext;
use voidcat_mcp::protocol::stdio::process_line;
use voidcat_mcp::server::McpServer;

/// Build an application context over an in-memory corpus and the given
/// backend, persisted in a fresh temp dir.
pub async fn make_context(
    backend: Arc<dyn ChatBackend>,
    texts: Vec<(&str, &str)>,
) -> (Arc<AppContext>, TempDir) {
    let dir = TempDir::new().unwrap();
    let corpus = Arc::new(Corpus::from_texts(
        texts
            .into_iter()
            .map(|(id, text)| (id.to_string(), text.to_string()))
            .collect(),
        &KnowledgeConfig::default(),
    ));
    let llm = LlmConfig {
        retry_base_ms: 1,
        retry_cap_ms: 1,
        max_attempts: 2,
        ..LlmConfig::default()
    };
    let mut config = EngineConfig::standard();
    config.llm = llm.clone();
    let gateway = Arc::new(LlmGateway::new(backend, &llm));
    let ctx = AppContext::initialize(corpus, gateway, config, dir.path())
        .await
        .unwrap();
    (ctx, dir)
}

/// Build an initialized MCP server.
pub async fn make_server(
    backend: Arc<dyn ChatBackend>,
    texts: Vec<(&str, &str)>,
) -> (Arc<McpServer>, TempDir) {
    let (ctx, dir) = make_context(backend, texts).await;
    let server = Arc::new(McpServer::new(ctx));
    let line = rpc_line(serde_json::json!("init"), "initialize", None);
    process_line(&server, &line).await.expect("initialize response");
    (server, dir)
}

/// Serialize one JSON-RPC request line.
pub fn rpc_line(
    id: serde_json::Value,
    method: &str,
    params: Option<serde_json::Value>,
) -> String {
    let mut request = serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
    });
    if let Some(params) = params {
        request["params"] = params;
    }
    request.to_string()
}

/// Serialize a `tools/call` request line.
pub fn tool_call_line(id: serde_json::Value, name: &str, args: serde_json::Value) -> String {
    rpc_line(
        id,
        "tools/call",
        Some(serde_json::json!({ "name": name, "arguments": args })),
    )
}

/// Drive one request through the transport pipeline and parse the reply.
pub async fn call(server: &McpServer, line: &str) -> serde_json::Value {
    let response = process_line(server, line).await.expect("response expected");
    assert!(
        !response.contains('\n'),
        "framing violated: response spans multiple lines"
    );
    serde_json::from_str(&response).expect("well-formed JSON response")
}

/// Extract the text payload of a successful `tools/call` response as JSON.
pub fn tool_result(response: &serde_json::Value) -> serde_json::Value {
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .unwrap_or_else(|| panic!("missing text content in {response}"));
    serde_json::from_str(text).expect("tool result payload is JSON")
}
