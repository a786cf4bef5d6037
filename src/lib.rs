//! formation-mcp library
//!
//! Exposes the Formation client, workflows and MCP server for the binary
//! and for integration tests.

pub mod config;
pub mod formation;
pub mod mcp;
pub mod metrics;
pub mod workflows;

pub use formation::{Credentials, FormationApi, FormationClient, FormationError};
pub use mcp::McpServer;
pub use workflows::{FormationWorkflows, LaunchOutcome, LaunchParams};
