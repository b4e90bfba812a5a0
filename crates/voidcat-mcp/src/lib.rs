//! VoidCat reasoning server.
//!
//! Fronts the reasoning core with three surfaces:
//!
//! - an MCP server over newline-delimited JSON-RPC 2.0 on stdio,
//! - an HTTP gateway with a WebSocket change broadcast,
//! - a tool registry shared by both.

pub mod context;
pub mod http;
pub mod protocol;
pub mod server;
pub mod tools;
