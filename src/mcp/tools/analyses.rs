//! Analysis Tools
//!
//! Tools for checking on and controlling launched analyses.

use std::fmt::Write;

use serde::Deserialize;
use serde_json::Value;

use super::{parse_params, service_error};
use crate::formation::{Analysis, AnalysisStatus};
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::ToolsCallResult;
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};
use crate::workflows::BrowserOutcome;

/// Register analysis tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(get_analysis_status_tool());
    registry.register_tool(list_running_analyses_tool());
    registry.register_tool(stop_analysis_tool());
    registry.register_tool(extend_analysis_time_tool());
    registry.register_tool(open_in_browser_tool());
}

#[derive(Debug, Deserialize)]
struct AnalysisIdParams {
    analysis_id: String,
}

fn analysis_id_schema(description: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "analysis_id": {
                "type": "string",
                "description": description
            }
        },
        "required": ["analysis_id"]
    })
}

// ============================================================================
// get_analysis_status
// ============================================================================

fn get_analysis_status_tool() -> RegisteredTool {
    ToolBuilder::new("get_analysis_status")
        .description("Check the current status of an analysis")
        .input_schema(analysis_id_schema("UUID of the analysis"))
        .build(get_analysis_status_handler)
}

async fn get_analysis_status_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: AnalysisIdParams = parse_params(params)?;

    match ctx.api().get_analysis_status(&params.analysis_id).await {
        Ok(status) => Ok(ToolsCallResult::text(format_analysis_status(&status))),
        Err(e) => Ok(service_error("get_analysis_status", &e)),
    }
}

pub(crate) fn format_analysis_status(status: &AnalysisStatus) -> String {
    let mut output = String::from("**Analysis Status**\n\n");
    let _ = writeln!(output, "ID: `{}`", status.analysis_id);
    let _ = writeln!(output, "Status: {}", status.status);
    let _ = writeln!(output, "URL Ready: {}", status.url_ready);
    if let Some(url) = status.url.as_deref().filter(|u| !u.is_empty()) {
        let _ = writeln!(output, "URL: {}", url);
    }
    output
}

// ============================================================================
// list_running_analyses
// ============================================================================

fn list_running_analyses_tool() -> RegisteredTool {
    ToolBuilder::new("list_running_analyses")
        .description("List all currently running analyses of the authenticated user")
        .build(list_running_analyses_handler)
}

async fn list_running_analyses_handler(ctx: ToolContext, _params: Value) -> ToolResult {
    match ctx.workflows.get_running_analyses().await {
        Ok(analyses) => Ok(ToolsCallResult::text(format_running_analyses(&analyses))),
        Err(e) => Ok(service_error("list_running_analyses", &e)),
    }
}

pub(crate) fn format_running_analyses(analyses: &[Analysis]) -> String {
    if analyses.is_empty() {
        return "No running analyses found".to_string();
    }

    let mut output = format!("Found {} running analyses:\n\n", analyses.len());
    for analysis in analyses {
        let _ = writeln!(output, "- **{}**", analysis.analysis_id);
        if let Some(name) = &analysis.name {
            let _ = writeln!(output, "  Name: {}", name);
        }
        let _ = writeln!(output, "  App: {}", analysis.app_id.as_deref().unwrap_or("N/A"));
        let _ = writeln!(
            output,
            "  System: {}",
            analysis.system_id.as_deref().unwrap_or("N/A")
        );
        let _ = writeln!(output, "  Status: {}\n", analysis.status);
    }
    output
}

// ============================================================================
// stop_analysis
// ============================================================================

#[derive(Debug, Deserialize)]
struct StopAnalysisParams {
    analysis_id: String,
    #[serde(default = "default_save_outputs")]
    save_outputs: bool,
}

fn default_save_outputs() -> bool {
    true
}

fn stop_analysis_tool() -> RegisteredTool {
    ToolBuilder::new("stop_analysis")
        .description("Stop a running analysis, optionally saving its outputs first")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "analysis_id": {
                    "type": "string",
                    "description": "UUID of the analysis to stop"
                },
                "save_outputs": {
                    "type": "boolean",
                    "description": "Save outputs before stopping (default true)"
                }
            },
            "required": ["analysis_id"]
        }))
        .build(stop_analysis_handler)
}

async fn stop_analysis_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: StopAnalysisParams = parse_params(params)?;

    match ctx
        .workflows
        .stop_analysis(&params.analysis_id, params.save_outputs)
        .await
    {
        Ok(_) => {
            let how = if params.save_outputs { "with" } else { "without" };
            Ok(ToolsCallResult::text(format!(
                "✅ Analysis `{}` stopped {} saving outputs",
                params.analysis_id, how
            )))
        }
        Err(e) => Ok(service_error("stop_analysis", &e)),
    }
}

// ============================================================================
// extend_analysis_time
// ============================================================================

fn extend_analysis_time_tool() -> RegisteredTool {
    ToolBuilder::new("extend_analysis_time")
        .description("Extend the time limit of a running interactive analysis")
        .input_schema(analysis_id_schema("UUID of the analysis to extend"))
        .build(extend_analysis_time_handler)
}

async fn extend_analysis_time_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: AnalysisIdParams = parse_params(params)?;

    match ctx.workflows.extend_analysis_time(&params.analysis_id).await {
        Ok(result) => {
            let mut output = format!("✅ Time limit extended for `{}`", params.analysis_id);
            if let Some(limit) = result.get("time_limit").and_then(Value::as_str) {
                let _ = write!(output, "\n**New time limit:** {}", limit);
            }
            Ok(ToolsCallResult::text(output))
        }
        Err(e) => Ok(service_error("extend_analysis_time", &e)),
    }
}

// ============================================================================
// open_in_browser
// ============================================================================

#[derive(Debug, Deserialize)]
struct OpenInBrowserParams {
    url: String,
}

fn open_in_browser_tool() -> RegisteredTool {
    ToolBuilder::new("open_in_browser")
        .description("Open an analysis URL in the default web browser")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL to open in browser"
                }
            },
            "required": ["url"]
        }))
        .build(open_in_browser_handler)
}

async fn open_in_browser_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: OpenInBrowserParams = parse_params(params)?;
    let outcome = ctx.workflows.open_in_browser(&params.url).await;
    Ok(format_browser_outcome(&outcome))
}

pub(crate) fn format_browser_outcome(outcome: &BrowserOutcome) -> ToolsCallResult {
    if outcome.opened {
        ToolsCallResult::text(format!("✅ Opened {} in browser", outcome.url))
    } else {
        ToolsCallResult::error(format!(
            "❌ Failed to open browser: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        ))
    }
}
