//! HTTP gateway shared state.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, Semaphore};

use crate::context::AppContext;

use super::events::ChangeEvent;

/// Shared state for every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<AppContext>,
    /// Bounds concurrent `/query` calls; excess requests get `503 busy`.
    pub query_limit: Arc<Semaphore>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(ctx: Arc<AppContext>, max_concurrent_queries: usize) -> Self {
        Self {
            ctx,
            query_limit: Arc::new(Semaphore::new(max_concurrent_queries.max(1))),
            start_time: Instant::now(),
        }
    }

    /// New event receiver for a WebSocket connection.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.ctx.subscribe()
    }
}
