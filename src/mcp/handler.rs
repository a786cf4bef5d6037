//! MCP message dispatch and stdio transport.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use super::context::ToolContext;
use super::protocol::{
    methods, InitializeParams, InitializeResult, McpError, McpRequest, McpResponse, PingResult,
    RequestId, ServerCapabilities, ServerInfo, ToolsCallParams, ToolsCapability, ToolsListResult,
    JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};
use super::registry::McpRegistry;
use crate::metrics;

pub const SERVER_NAME: &str = "formation-mcp";

pub fn server_version() -> String {
    format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"))
}

/// One MCP session: a registry, the context handed to tools, and the
/// handshake state.
pub struct McpServer {
    registry: Arc<McpRegistry>,
    context: ToolContext,
    initialized: bool,
}

impl McpServer {
    pub fn new(registry: Arc<McpRegistry>, context: ToolContext) -> Self {
        info!("MCP server ready with {} tools", registry.tool_count());
        Self {
            registry,
            context,
            initialized: false,
        }
    }

    /// Serve newline-delimited JSON-RPC on stdin/stdout until stdin closes.
    pub async fn serve_stdio(&mut self) -> std::io::Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve newline-delimited JSON-RPC until `reader` reaches EOF.
    pub async fn serve<R, W>(&mut self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let Some(response) = self.handle_message(&line).await else {
                continue;
            };
            match serde_json::to_string(&response) {
                Ok(json) => {
                    writer.write_all(json.as_bytes()).await?;
                    writer.write_all(b"\n").await?;
                    writer.flush().await?;
                }
                Err(e) => {
                    error!("Failed to serialize MCP response: {}", e);
                }
            }
        }

        debug!("MCP input closed");
        Ok(())
    }

    /// Handle a single MCP message. Notifications yield `None`.
    pub async fn handle_message(&mut self, text: &str) -> Option<McpResponse> {
        let raw: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                return Some(McpResponse::error(
                    None,
                    McpError::ParseError(e.to_string()),
                ));
            }
        };

        let request: McpRequest = match serde_json::from_value(raw.clone()) {
            Ok(req) => req,
            Err(e) => {
                let id = raw
                    .get("id")
                    .cloned()
                    .and_then(|id| serde_json::from_value::<RequestId>(id).ok());
                return Some(McpResponse::error(
                    id,
                    McpError::InvalidRequest(e.to_string()),
                ));
            }
        };

        let result = if request.jsonrpc != JSONRPC_VERSION {
            Err(McpError::InvalidRequest(format!(
                "unsupported jsonrpc version {}",
                request.jsonrpc
            )))
        } else {
            self.dispatch(&request).await
        };

        let id = request.id?;
        Some(match result {
            Ok(value) => McpResponse::success(id, value),
            Err(error) => McpResponse::error(Some(id), error),
        })
    }

    async fn dispatch(&mut self, request: &McpRequest) -> Result<Value, McpError> {
        debug!("MCP <- {}", request.method);
        match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(request),
            methods::INITIALIZED => Ok(Value::Null),
            methods::PING => to_value(PingResult {}),
            methods::SHUTDOWN => {
                info!("MCP client requested shutdown");
                Ok(Value::Object(Default::default()))
            }
            methods::TOOLS_LIST => {
                self.require_initialized()?;
                to_value(ToolsListResult {
                    tools: self.registry.tool_definitions(),
                })
            }
            methods::TOOLS_CALL => {
                self.require_initialized()?;
                self.handle_tools_call(request).await
            }
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    fn require_initialized(&self) -> Result<(), McpError> {
        if self.initialized {
            Ok(())
        } else {
            Err(McpError::InvalidRequest("Not initialized".to_string()))
        }
    }

    fn handle_initialize(&mut self, request: &McpRequest) -> Result<Value, McpError> {
        let params: Option<InitializeParams> = request
            .params
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;

        if let Some(client) = params.as_ref().and_then(|p| p.client_info.as_ref()) {
            info!(
                "MCP client {} {} connected",
                client.name,
                client.version.as_deref().unwrap_or("")
            );
        }
        self.initialized = true;

        to_value(InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability { list_changed: None },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: server_version(),
            },
        })
    }

    async fn handle_tools_call(&self, request: &McpRequest) -> Result<Value, McpError> {
        let params: ToolsCallParams = request
            .params
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::InvalidParams(e.to_string()))?
            .ok_or_else(|| McpError::InvalidParams("Missing params".to_string()))?;

        let tool = self
            .registry
            .get_tool(&params.name)
            .ok_or_else(|| McpError::MethodNotFound(format!("Unknown tool: {}", params.name)))?;

        let arguments = params.arguments.unwrap_or(serde_json::json!({}));
        let result = (tool.handler)(self.context.clone(), arguments).await;

        match &result {
            Ok(call) if call.is_error() => {
                warn!("Tool {} failed: {}", params.name, call.text_content());
                metrics::record_tool_call(&params.name, "tool_error");
            }
            Ok(_) => metrics::record_tool_call(&params.name, "ok"),
            Err(e) => {
                warn!("Tool {} rejected: {}", params.name, e);
                metrics::record_tool_call(&params.name, "protocol_error");
            }
        }

        to_value(result?)
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, McpError> {
    serde_json::to_value(value).map_err(|e| McpError::InternalError(e.to_string()))
}
