//! stdio transport for MCP.
//!
//! Framing: one JSON value per line on stdin/stdout, UTF-8, flushed after
//! each message. Nothing but JSON-RPC ever touches stdout; logs go to
//! stderr.
//!
//! The reader is a dedicated OS thread doing blocking line reads and
//! handing completed lines to the async dispatcher over a channel. This is
//! the portability seam: no async pipe primitives are assumed, so the
//! transport behaves identically on hosts without them. Requests dispatch
//! concurrently under a counting semaphore (excess calls queue, never
//! reject); a single writer task owns stdout so concurrent responses can
//! never interleave.

use std::io::{BufRead, Write};
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::types::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::server::McpServer;

/// Default cap on concurrently executing requests.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Spawn the blocking stdin reader thread. Completed lines arrive on the
/// returned channel; the channel closes on EOF.
pub fn spawn_stdin_reader(buffer: usize) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(buffer);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("stdin read failed: {e}");
                    break;
                }
            }
        }
        debug!("stdin reader thread exiting");
    });
    rx
}

/// Process one raw input line into at most one serialized response line.
///
/// Parse failures produce a JSON-RPC parse error; notifications produce
/// nothing.
pub async fn process_line(server: &McpServer, line: &str) -> Option<String> {
    if line.trim().is_empty() {
        return None;
    }
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!("unparseable request: {e}");
            return serialize_response(JsonRpcResponse::error(None, JsonRpcError::parse_error()));
        }
    };
    let response = server.handle_request(request).await?;
    serialize_response(response)
}

fn serialize_response(response: JsonRpcResponse) -> Option<String> {
    match serde_json::to_string(&response) {
        Ok(json) => Some(json),
        Err(e) => {
            error!("failed to serialize response: {e}");
            // Minimal fallback so the client never hangs.
            Some(
                r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#
                    .to_string(),
            )
        }
    }
}

/// stdio transport for the MCP server.
pub struct StdioTransport {
    max_concurrency: usize,
}

impl StdioTransport {
    pub fn new(max_concurrency: usize) -> Self {
        Self { max_concurrency: max_concurrency.max(1) }
    }

    /// Run until `shutdown` is received or stdin reaches EOF.
    ///
    /// `shutdown` drains in-flight calls before the loop ends; EOF aborts
    /// them, since the client is gone.
    pub async fn run(self, server: Arc<McpServer>) -> std::io::Result<()> {
        let mut lines = spawn_stdin_reader(64);
        let (out_tx, mut out_rx) = mpsc::channel::<String>(64);

        // Single writer task: whole-line writes with a flush per message.
        let writer = tokio::task::spawn_blocking(move || {
            let stdout = std::io::stdout();
            let mut stdout = stdout.lock();
            while let Some(line) = out_rx.blocking_recv() {
                if writeln!(stdout, "{line}").and_then(|()| stdout.flush()).is_err() {
                    break;
                }
            }
        });

        // Debug visibility goes through a notification, never bare stdout.
        if let Ok(ready) =
            serde_json::to_string(&JsonRpcNotification::log_message("info", "voidcat ready"))
        {
            let _ = out_tx.send(ready).await;
        }

        let limiter = Arc::new(Semaphore::new(self.max_concurrency));
        let mut inflight: JoinSet<()> = JoinSet::new();
        let mut clean_shutdown = false;

        loop {
            tokio::select! {
                maybe_line = lines.recv() => {
                    let Some(line) = maybe_line else {
                        info!("stdin closed, shutting down transport");
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    if is_shutdown_request(&line) {
                        // Drain in-flight calls, answer, then stop.
                        while inflight.join_next().await.is_some() {}
                        if let Some(response) = process_line(&server, &line).await {
                            let _ = out_tx.send(response).await;
                        }
                        clean_shutdown = true;
                        break;
                    }

                    let server = Arc::clone(&server);
                    let out = out_tx.clone();
                    let limiter = Arc::clone(&limiter);
                    inflight.spawn(async move {
                        // Held, not rejected: excess calls queue here.
                        let Ok(_permit) = limiter.acquire_owned().await else {
                            return;
                        };
                        if let Some(response) = process_line(&server, &line).await {
                            let _ = out.send(response).await;
                        }
                    });
                }
                // Reap finished requests so the set stays small.
                Some(_) = inflight.join_next(), if !inflight.is_empty() => {}
            }
        }

        if clean_shutdown {
            while inflight.join_next().await.is_some() {}
        } else {
            // Client disconnected: in-flight calls are cancelled.
            inflight.shutdown().await;
        }
        drop(out_tx);
        let _ = writer.await;
        Ok(())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

/// Cheap pre-parse check for the shutdown method, so the main loop can
/// drain before answering it.
fn is_shutdown_request(line: &str) -> bool {
    serde_json::from_str::<JsonRpcRequest>(line)
        .map(|r| r.method == "shutdown")
        .unwrap_or(false)
}

// ============================================================================
// TESTS
// ============================================================================
