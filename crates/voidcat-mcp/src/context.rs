//! Shared application context.
//!
//! One `AppContext` is built at startup and shared by the MCP dispatcher
//! and the HTTP gateway. Mutations to the task/memory substrate broadcast
//! change events for WebSocket subscribers.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use voidcat_core::{Coordinator, CoreError, EngineConfig, LlmGateway, MemoryStore, TaskStore};

use crate::http::events::ChangeEvent;

/// Broadcast capacity before slow subscribers start losing events.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Everything a tool handler or HTTP handler needs.
pub struct AppContext {
    pub coordinator: Coordinator,
    pub tasks: TaskStore,
    pub memories: MemoryStore,
    event_tx: broadcast::Sender<ChangeEvent>,
}

impl AppContext {
    /// Wire up the context: open the stores under `data_dir` and build the
    /// coordinator over the given corpus and gateway.
    pub async fn initialize(
        corpus: Arc<voidcat_core::Corpus>,
        gateway: Arc<LlmGateway>,
        config: EngineConfig,
        data_dir: &Path,
    ) -> Result<Arc<Self>, CoreError> {
        let tasks = TaskStore::open(data_dir).await?;
        let memories = MemoryStore::open(data_dir).await?;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        info!(data_dir = %data_dir.display(), "application context ready");
        Ok(Arc::new(Self {
            coordinator: Coordinator::new(corpus, gateway, config),
            tasks,
            memories,
            event_tx,
        }))
    }

    /// Broadcast a change event. A send with no subscribers is a no-op.
    pub fn emit(&self, event: ChangeEvent) {
        let _ = self.event_tx.send(event);
    }

    /// New receiver for WebSocket connections.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.event_tx.subscribe()
    }
}
