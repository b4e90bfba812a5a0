//! Task and memory substrate journeys: hierarchy, crash safety,
//! idempotence.

use std::sync::Arc;

use voidcat_e2e_tests::harness::{call, make_server, tool_call_line, tool_result};
use voidcat_e2e_tests::mocks::{EchoBackend, OfflineBackend};
use voidcat_core::{Task, TaskFilter, TaskStore};

#[tokio::test]
async fn test_create_list_delete_journey() {
    let (server, _dir) = make_server(Arc::new(EchoBackend), vec![]).await;

    let created = call(
        &server,
        &tool_call_line(
            serde_json::json!(1),
            "voidcat_create_task",
            serde_json::json!({ "name": "triage inbox" }),
        ),
    )
    .await;
    let task = tool_result(&created);
    let id = task["id"].as_str().unwrap().to_string();

    let listed = call(
        &server,
        &tool_call_line(serde_json::json!(2), "voidcat_list_tasks", serde_json::json!({})),
    )
    .await;
    assert_eq!(tool_result(&listed)["total"], 1);

    call(
        &server,
        &tool_call_line(
            serde_json::json!(3),
            "voidcat_delete_task",
            serde_json::json!({ "id": id }),
        ),
    )
    .await;

    let listed = call(
        &server,
        &tool_call_line(serde_json::json!(4), "voidcat_list_tasks", serde_json::json!({})),
    )
    .await;
    assert_eq!(tool_result(&listed)["total"], 0);

    // Deleting again is NotFound without side effect.
    let missing = call(
        &server,
        &tool_call_line(
            serde_json::json!(5),
            "voidcat_delete_task",
            serde_json::json!({ "id": "no-such-task" }),
        ),
    )
    .await;
    assert_eq!(missing["error"]["data"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_hierarchy_and_cycle_rejection() {
    let (server, _dir) = make_server(Arc::new(EchoBackend), vec![]).await;

    let a = tool_result(
        &call(
            &server,
            &tool_call_line(
                serde_json::json!(1),
                "voidcat_create_task",
                serde_json::json!({ "name": "A" }),
            ),
        )
        .await,
    );
    let a_id = a["id"].as_str().unwrap().to_string();

    let b = tool_result(
        &call(
            &server,
            &tool_call_line(
                serde_json::json!(2),
                "voidcat_create_task",
                serde_json::json!({ "name": "B", "parentId": a_id }),
            ),
        )
        .await,
    );
    let b_id = b["id"].as_str().unwrap().to_string();

    // Moving A under its own child must be a cycle conflict.
    let response = call(
        &server,
        &tool_call_line(
            serde_json::json!(3),
            "voidcat_move_task",
            serde_json::json!({ "id": a_id, "newParentId": b_id }),
        ),
    )
    .await;
    assert_eq!(response["error"]["code"], -32000);
    assert_eq!(response["error"]["data"]["code"], "CYCLE");
}

#[tokio::test]
async fn test_crash_mid_write_preserves_pre_state() {
    let dir = tempfile::TempDir::new().unwrap();

    let id = {
        let store = TaskStore::open(dir.path()).await.unwrap();
        store.create(Task::new("pre-state task")).await.unwrap().id
    };

    // Simulate a crash mid-write: truncated temp file, rename never ran.
    std::fs::write(
        dir.path().join("tasks.json.tmp"),
        br#"{"version":1,"items":[{"id":"half-writ"#,
    )
    .unwrap();

    // Restart: the store loads the pre-state, not a parse error.
    let store = TaskStore::open(dir.path()).await.unwrap();
    let tasks = store.list(&TaskFilter::default()).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, id);
    assert_eq!(tasks[0].name, "pre-state task");
}

#[tokio::test]
async fn test_register_category_idempotence_over_restart() {
    let (server, _dir) = make_server(Arc::new(EchoBackend), vec![]).await;

    for id in [1, 2] {
        call(
            &server,
            &tool_call_line(
                serde_json::json!(id),
                "voidcat_register_category",
                serde_json::json!({ "name": "esoterica" }),
            ),
        )
        .await;
    }

    let listed = call(
        &server,
        &tool_call_line(
            serde_json::json!(3),
            "voidcat_list_categories",
            serde_json::json!({}),
        ),
    )
    .await;
    let categories = tool_result(&listed);
    let count = categories["categories"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|c| c.as_str() == Some("esoterica"))
        .count();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_store_operations_unaffected_by_llm_outage() {
    let (server, _dir) = make_server(Arc::new(OfflineBackend), vec![]).await;

    let created = call(
        &server,
        &tool_call_line(
            serde_json::json!(1),
            "voidcat_store_memory",
            serde_json::json!({ "title": "offline note", "content": "still works" }),
        ),
    )
    .await;
    assert!(created["result"].is_object());

    let hits = call(
        &server,
        &tool_call_line(
            serde_json::json!(2),
            "voidcat_search_memory",
            serde_json::json!({ "query": "offline" }),
        ),
    )
    .await;
    assert_eq!(tool_result(&hits)["total"], 1);
}

#[tokio::test]
async fn test_reopening_completed_task_requires_force() {
    let (server, _dir) = make_server(Arc::new(EchoBackend), vec![]).await;
    let task = tool_result(
        &call(
            &server,
            &tool_call_line(
                serde_json::json!(1),
                "voidcat_create_task",
                serde_json::json!({ "name": "finish" }),
            ),
        )
        .await,
    );
    let id = task["id"].as_str().unwrap().to_string();

    call(
        &server,
        &tool_call_line(
            serde_json::json!(2),
            "voidcat_update_task",
            serde_json::json!({ "id": id, "status": "completed" }),
        ),
    )
    .await;

    let refused = call(
        &server,
        &tool_call_line(
            serde_json::json!(3),
            "voidcat_update_task",
            serde_json::json!({ "id": id, "status": "pending" }),
        ),
    )
    .await;
    assert_eq!(refused["error"]["data"]["code"], "TASK_CONFLICT");

    let forced = call(
        &server,
        &tool_call_line(
            serde_json::json!(4),
            "voidcat_update_task",
            serde_json::json!({ "id": id, "status": "pending", "force": true }),
        ),
    )
    .await;
    assert_eq!(tool_result(&forced)["status"], "pending");
}
