//! MCP protocol layer: JSON-RPC types, message bodies, and the
//! platform-portable stdio transport.

pub mod messages;
pub mod stdio;
pub mod types;
