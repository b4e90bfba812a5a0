//! WebSocket handler for the change-event stream.
//!
//! Clients connect to `/vscode/api/v1/ws` and receive every task, memory,
//! and system change event as JSON, plus a heartbeat every 5 seconds.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::events::ChangeEvent;
use super::state::AppState;

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut event_rx: broadcast::Receiver<ChangeEvent> = state.subscribe();

    debug!("WebSocket client connected");

    let welcome = ChangeEvent::system(
        "connected",
        serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }),
    );
    if sender.send(Message::Text(welcome.to_json().into())).await.is_err() {
        return;
    }

    let mut heartbeat = tokio::time::interval(std::time::Duration::from_secs(5));
    heartbeat.tick().await; // first tick fires immediately; skip it

    loop {
        tokio::select! {
            // Change event from the substrate or the engine
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        if sender.send(Message::Text(event.to_json().into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "WebSocket client lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            // Heartbeat with live totals
            _ = heartbeat.tick() => {
                let tasks = state.ctx.tasks.stats().await.map(|s| s.total).unwrap_or(0);
                let memories = state.ctx.memories.count().await;
                let event = ChangeEvent::system("heartbeat", serde_json::json!({
                    "uptimeSecs": state.start_time.elapsed().as_secs(),
                    "tasks": tasks,
                    "memories": memories,
                }));
                if sender.send(Message::Text(event.to_json().into())).await.is_err() {
                    break;
                }
            }
            // Client traffic: answer pings, stop on close
            message = receiver.next() => {
                match message {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error: {e}");
                        break;
                    }
                }
            }
        }
    }

    debug!("WebSocket client disconnected");
}
