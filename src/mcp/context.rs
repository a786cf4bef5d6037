//! MCP Tool Execution Context
//!
//! Provides access to the Formation client and workflows for tool implementations.

use std::sync::Arc;
use std::time::Duration;

use crate::formation::FormationApi;
use crate::workflows::{FormationWorkflows, DEFAULT_POLL_INTERVAL};

/// Defaults applied when a tool call leaves an argument out.
#[derive(Debug, Clone, Copy)]
pub struct ToolSettings {
    pub poll_interval: Duration,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Context provided to tool handlers during execution
#[derive(Clone)]
pub struct ToolContext {
    pub workflows: Arc<FormationWorkflows>,
    pub settings: ToolSettings,
}

impl ToolContext {
    pub fn new(workflows: Arc<FormationWorkflows>, settings: ToolSettings) -> Self {
        Self {
            workflows,
            settings,
        }
    }

    /// Direct access to the API for single-call tools.
    pub fn api(&self) -> &Arc<dyn FormationApi> {
        self.workflows.api()
    }
}
