//! MCP protocol end-to-end tests: framing, concurrency, error codes.

use std::sync::Arc;

use voidcat_e2e_tests::harness::{call, make_server, rpc_line, tool_call_line};
use voidcat_e2e_tests::mocks::EchoBackend;
use voidcat_mcp::protocol::stdio::process_line;
use voidcat_mcp::server::McpServer;

async fn server() -> (Arc<McpServer>, tempfile::TempDir) {
    make_server(Arc::new(EchoBackend), vec![]).await
}

#[tokio::test]
async fn test_initialize_then_interleaved_calls_correlate_by_id() {
    let (ctx, _dir) =
        voidcat_e2e_tests::harness::make_context(Arc::new(EchoBackend), vec![]).await;
    let server = Arc::new(McpServer::new(ctx));

    // initialize, then two interleaved tools/call requests with ids 1 and 2.
    let init = call(&server, &rpc_line(serde_json::json!("init-1"), "initialize", None)).await;
    let first = tool_call_line(serde_json::json!(1), "voidcat_task_stats", serde_json::json!({}));
    let second = tool_call_line(
        serde_json::json!(2),
        "voidcat_list_categories",
        serde_json::json!({}),
    );

    let (a, b) = tokio::join!(call(&server, &first), call(&server, &second));

    // Three well-formed responses whose ids are init's, 1, and 2.
    assert_eq!(init["id"], "init-1");
    let mut ids = vec![a["id"].clone(), b["id"].clone()];
    ids.sort_by_key(|v| v.as_i64());
    assert_eq!(ids, vec![serde_json::json!(1), serde_json::json!(2)]);
    assert!(a["result"].is_object());
    assert!(b["result"].is_object());
}

#[tokio::test]
async fn test_hundred_concurrent_calls_produce_clean_frames() {
    let (server, _dir) = server().await;

    let mut joins = Vec::new();
    for id in 0..100i64 {
        let server = Arc::clone(&server);
        joins.push(tokio::spawn(async move {
            let line =
                tool_call_line(serde_json::json!(id), "voidcat_task_stats", serde_json::json!({}));
            process_line(&server, &line).await.expect("response")
        }));
    }

    let mut seen = Vec::new();
    for join in joins {
        let raw = join.await.unwrap();
        // A line-oriented parser must recover exactly one object per line.
        assert!(!raw.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value["result"].is_object(), "unexpected failure: {value}");
        seen.push(value["id"].as_i64().unwrap());
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..100).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_parse_error_yields_null_id_error() {
    let (server, _dir) = server().await;
    let response = call(&server, "this is not json").await;
    assert_eq!(response["error"]["code"], -32700);
    assert!(response["id"].is_null());
}

#[tokio::test]
async fn test_unknown_tool_is_method_not_found() {
    let (server, _dir) = server().await;
    let response = call(
        &server,
        &tool_call_line(serde_json::json!(7), "no_such_tool", serde_json::json!({})),
    )
    .await;
    assert_eq!(response["error"]["code"], -32601);
}

#[tokio::test]
async fn test_schema_violation_is_invalid_params() {
    let (server, _dir) = server().await;
    let response = call(
        &server,
        &tool_call_line(
            serde_json::json!(8),
            "voidcat_create_task",
            serde_json::json!({ "priority": 3 }),
        ),
    )
    .await;
    assert_eq!(response["error"]["code"], -32602);
}

#[tokio::test]
async fn test_tools_list_exposes_full_registry() {
    let (server, _dir) = server().await;
    let response = call(&server, &rpc_line(serde_json::json!(3), "tools/list", None)).await;
    let tools = response["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 15);
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert!(names.contains(&"voidcat_enhanced_query"));
    assert!(names.contains(&"voidcat_sequential_thinking"));
    assert!(names.contains(&"voidcat_create_task"));
    assert!(names.contains(&"voidcat_register_category"));
}

#[tokio::test]
async fn test_notifications_produce_no_output() {
    let (server, _dir) = server().await;
    // Notifications are one-way: no response line at all.
    let request = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "notifications/initialized"
    });
    let raw = process_line(&server, &request.to_string()).await;
    assert!(raw.is_none());
}

#[tokio::test]
async fn test_shutdown_is_acknowledged() {
    let (server, _dir) = server().await;
    let response = call(&server, &rpc_line(serde_json::json!(99), "shutdown", None)).await;
    assert!(response["error"].is_null());
    assert_eq!(response["id"], 99);
}
