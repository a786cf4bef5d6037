//! MCP Tools
//!
//! Tool implementations for apps, analyses and the data store.

pub mod analyses;
pub mod apps;
pub mod data;

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::protocol::{McpError, ToolsCallResult};
use super::registry::McpRegistry;
use crate::formation::FormationError;

/// System used when a tool call does not name one.
pub const DEFAULT_SYSTEM_ID: &str = "de";

/// Register all tools with the registry
pub fn register_all_tools(registry: &mut McpRegistry) {
    apps::register_tools(registry);
    analyses::register_tools(registry);
    data::register_tools(registry);
}

/// Registry holding every tool this server offers.
pub fn default_registry() -> McpRegistry {
    let mut registry = McpRegistry::new();
    register_all_tools(&mut registry);
    registry
}

pub(crate) fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, McpError> {
    serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))
}

/// Remote failures are reported to the model as an error result, not a protocol error.
pub(crate) fn service_error(tool: &str, err: &FormationError) -> ToolsCallResult {
    ToolsCallResult::error(format!("❌ Error executing {}: {}", tool, err))
}

pub(crate) fn default_system_id() -> String {
    DEFAULT_SYSTEM_ID.to_string()
}

/// Flatten JSON metadata values into the strings sent as headers.
pub(crate) fn metadata_strings(metadata: BTreeMap<String, Value>) -> BTreeMap<String, String> {
    metadata
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}
