//! MCP (Model Context Protocol) Server
//!
//! Exposes the Formation API as MCP tools.
//!
//! ## Architecture
//!
//! - Transport: newline-delimited JSON-RPC 2.0 on stdin/stdout
//! - Tools: one thin handler per operation, rendering Markdown text
//! - Remote failures are tool results with `isError`, bad arguments are protocol errors

pub mod context;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod tools;

pub use context::{ToolContext, ToolSettings};
pub use handler::McpServer;
pub use protocol::{McpError, McpRequest, McpResponse};
pub use registry::McpRegistry;
