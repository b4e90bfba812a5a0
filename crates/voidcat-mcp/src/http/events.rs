//! Change events broadcast to WebSocket subscribers.
//!
//! Every task/memory mutation and every diagnostics change emits one of
//! these; connected clients receive them as
//! `{"type": "task"|"memory"|"system", "payload": {...}}`.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

/// One change notification.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum ChangeEvent {
    Task(Value),
    Memory(Value),
    System(Value),
}

impl ChangeEvent {
    /// Task mutation event.
    pub fn task(action: &str, body: Value) -> Self {
        ChangeEvent::Task(serde_json::json!({
            "action": action,
            "task": body,
            "timestamp": Utc::now(),
        }))
    }

    /// Memory mutation event.
    pub fn memory(action: &str, body: Value) -> Self {
        ChangeEvent::Memory(serde_json::json!({
            "action": action,
            "memory": body,
            "timestamp": Utc::now(),
        }))
    }

    /// System/diagnostics event.
    pub fn system(event: &str, body: Value) -> Self {
        ChangeEvent::System(serde_json::json!({
            "event": event,
            "detail": body,
            "timestamp": Utc::now(),
        }))
    }

    /// Serialize for WebSocket transmission.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
