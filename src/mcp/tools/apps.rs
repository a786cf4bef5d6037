//! App Tools
//!
//! Tools for browsing the app catalog and launching apps.

use std::fmt::Write;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::{default_system_id, parse_params, service_error};
use crate::formation::{AppListing, AppParameters, LaunchConfig, Parameter};
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::ToolsCallResult;
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};
use crate::workflows::{BrowserOutcome, LaunchOutcome, LaunchParams};

/// Register app tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(list_apps_tool());
    registry.register_tool(get_app_parameters_tool());
    registry.register_tool(launch_app_and_wait_tool());
}

// ============================================================================
// list_apps
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListAppsParams {
    #[serde(default)]
    name: Option<String>,
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
}

fn default_limit() -> u32 {
    10
}

fn list_apps_tool() -> RegisteredTool {
    ToolBuilder::new("list_apps")
        .description("List available applications, optionally filtered by name")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Filter apps by name (case-insensitive partial match)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of apps to return (default 10)",
                    "minimum": 1
                },
                "offset": {
                    "type": "integer",
                    "description": "Number of apps to skip for pagination (default 0)",
                    "minimum": 0
                }
            }
        }))
        .build(list_apps_handler)
}

async fn list_apps_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ListAppsParams = parse_params(params)?;

    match ctx
        .api()
        .list_apps(params.limit, params.offset, params.name.as_deref())
        .await
    {
        Ok(listing) => Ok(ToolsCallResult::text(format_app_listing(&listing))),
        Err(e) => Ok(service_error("list_apps", &e)),
    }
}

pub(crate) fn format_app_listing(listing: &AppListing) -> String {
    if listing.apps.is_empty() {
        return "No apps found".to_string();
    }

    let mut output = format!("Found {} apps:\n\n", listing.total);
    for app in &listing.apps {
        let _ = writeln!(output, "- **{}**", app.name);
        let _ = writeln!(output, "  ID: `{}`", app.id);
        let _ = writeln!(output, "  System: {}", app.system_id);
        if let Some(job_type) = &app.overall_job_type {
            let _ = writeln!(output, "  Job Type: {}", job_type);
        }
        if let Some(integrator) = &app.integrator_username {
            let _ = writeln!(output, "  Integrator: {}", integrator);
        }
        if let Some(description) = app.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = writeln!(output, "  Description: {}", description);
        }
        output.push('\n');
    }
    output
}

// ============================================================================
// get_app_parameters
// ============================================================================

#[derive(Debug, Deserialize)]
struct AppRefParams {
    app_id: String,
    #[serde(default = "default_system_id")]
    system_id: String,
}

fn get_app_parameters_tool() -> RegisteredTool {
    ToolBuilder::new("get_app_parameters")
        .description(
            "Get the parameters of an app: which are required, their types and defaults. \
             Use this before launching an app.",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "app_id": {
                    "type": "string",
                    "description": "UUID of the app"
                },
                "system_id": {
                    "type": "string",
                    "description": "System identifier (default 'de')"
                }
            },
            "required": ["app_id"]
        }))
        .build(get_app_parameters_handler)
}

async fn get_app_parameters_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: AppRefParams = parse_params(params)?;

    match ctx
        .api()
        .get_app_parameters(&params.app_id, &params.system_id)
        .await
    {
        Ok(parameters) => Ok(ToolsCallResult::text(format_app_parameters(
            &params.app_id,
            &parameters,
        ))),
        Err(e) => Ok(service_error("get_app_parameters", &e)),
    }
}

pub(crate) fn format_app_parameters(app_id: &str, parameters: &AppParameters) -> String {
    let mut output = format!("**App Parameters: {}**\n\n", app_id);
    if let Some(job_type) = &parameters.overall_job_type {
        let _ = write!(output, "**Job Type:** {}\n\n", job_type);
    }

    let (required, optional): (Vec<&Parameter>, Vec<&Parameter>) = parameters
        .parameters()
        .filter(|p| p.is_visible())
        .partition(|p| p.is_required());

    if required.is_empty() {
        output.push_str("**No required parameters**\n\n");
    } else {
        output.push_str("**Required Parameters:**\n");
        for param in required {
            let _ = writeln!(output, "- `{}` ({})", param.id, param.type_name());
            let _ = writeln!(
                output,
                "  {}",
                param.description.as_deref().unwrap_or("No description")
            );
            if let Some(default) = &param.default_value {
                let _ = writeln!(output, "  Default: {}", display_value(default));
            }
            output.push('\n');
        }
    }

    if !optional.is_empty() {
        let _ = writeln!(
            output,
            "**Optional Parameters:** {} available",
            optional.len()
        );
    }
    output
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// launch_app_and_wait
// ============================================================================

#[derive(Debug, Deserialize)]
struct LaunchAppParams {
    app_id: String,
    #[serde(default = "default_system_id")]
    system_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default = "default_max_wait")]
    max_wait: u64,
    #[serde(default)]
    poll_interval: Option<u64>,
    #[serde(default)]
    config: Option<LaunchConfig>,
    #[serde(default)]
    overall_job_type: Option<String>,
    #[serde(default = "default_open_browser")]
    open_browser: bool,
}

fn default_max_wait() -> u64 {
    300
}

fn default_open_browser() -> bool {
    true
}

fn launch_app_and_wait_tool() -> RegisteredTool {
    ToolBuilder::new("launch_app_and_wait")
        .description(
            "Launch an app. Interactive apps are polled until their URL is ready and the URL \
             is returned. If the app needs parameters that were not supplied, nothing is \
             launched and the missing parameters are listed instead.",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "app_id": {
                    "type": "string",
                    "description": "UUID of the app to launch"
                },
                "system_id": {
                    "type": "string",
                    "description": "System identifier (default 'de')"
                },
                "name": {
                    "type": "string",
                    "description": "Custom name for the analysis"
                },
                "max_wait": {
                    "type": "integer",
                    "description": "Maximum seconds to wait for an interactive app (default 300)",
                    "minimum": 0
                },
                "poll_interval": {
                    "type": "integer",
                    "description": "Seconds between status checks (default from server configuration)",
                    "minimum": 1
                },
                "config": {
                    "type": "object",
                    "description": "Launch parameters keyed by parameter id"
                },
                "overall_job_type": {
                    "type": "string",
                    "description": "Job type from list_apps. When given, the parameter check is skipped. Values: 'Interactive', 'DE', 'OSG', 'Tapis'"
                },
                "open_browser": {
                    "type": "boolean",
                    "description": "Open the URL of a ready interactive app in the local browser (default true)"
                }
            },
            "required": ["app_id"]
        }))
        .build(launch_app_and_wait_handler)
}

async fn launch_app_and_wait_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: LaunchAppParams = parse_params(params)?;
    let poll_interval = params
        .poll_interval
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(ctx.settings.poll_interval);

    let launch = LaunchParams {
        app_id: params.app_id,
        system_id: params.system_id,
        name: params.name,
        config: params.config,
        max_wait: Duration::from_secs(params.max_wait),
        poll_interval,
        overall_job_type: params.overall_job_type,
    };

    let outcome = match ctx.workflows.launch_and_wait(launch).await {
        Ok(outcome) => outcome,
        Err(e) => return Ok(service_error("launch_app_and_wait", &e)),
    };

    let browser = match &outcome {
        LaunchOutcome::Ready { url, .. } if params.open_browser => {
            Some(ctx.workflows.open_in_browser(url).await)
        }
        _ => None,
    };

    Ok(ToolsCallResult::text(format_launch_outcome(
        &outcome,
        browser.as_ref(),
    )))
}

pub(crate) fn format_launch_outcome(
    outcome: &LaunchOutcome,
    browser: Option<&BrowserOutcome>,
) -> String {
    match outcome {
        LaunchOutcome::MissingParameters { missing, .. } => format_missing_parameters(missing),
        LaunchOutcome::Ready {
            analysis_id,
            url,
            status,
            wait_time,
        } => {
            let mut output = String::from("✅ Analysis launched successfully!\n\n");
            let _ = writeln!(output, "**Analysis ID:** `{}`", analysis_id);
            let _ = writeln!(output, "**Status:** {}", status);
            let _ = writeln!(output, "**URL:** {}", url);
            let _ = writeln!(output, "**Wait time:** {}s", wait_time.as_secs());
            match browser {
                Some(b) if b.opened => output.push_str("\n🌐 Opened in browser\n"),
                Some(b) => {
                    let _ = write!(
                        output,
                        "\n⚠️ Could not open browser: {}\n",
                        b.error.as_deref().unwrap_or("unknown error")
                    );
                }
                None => {}
            }
            output
        }
        LaunchOutcome::Submitted {
            analysis_id,
            job_type,
        } => {
            let mut output = String::from("✅ Analysis launched successfully!\n\n");
            let _ = writeln!(output, "**Analysis ID:** `{}`", analysis_id);
            output.push_str("**Status:** submitted\n");
            let _ = writeln!(output, "**Job Type:** {}", job_type);
            output.push_str("\n📋 Batch job submitted - check status later\n");
            output
        }
    }
}

fn format_missing_parameters(missing: &[Parameter]) -> String {
    let mut output = String::from("⚠️ This app requires additional parameters:\n\n");
    for param in missing {
        let _ = writeln!(output, "- **{}** (`{}`)", param.display_name(), param.id);
        let _ = writeln!(output, "  Type: {}", param.type_name());
        if let Some(description) = param.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = writeln!(output, "  Description: {}", description);
        }
        output.push('\n');
    }

    output.push_str(
        "\nPlease call this tool again with a `config` parameter containing the required values.\n",
    );
    output.push_str("Example config format:\n```json\n{\n");
    let entries: Vec<String> = missing
        .iter()
        .map(|p| format!("  \"{}\": \"value\"", p.id))
        .collect();
    output.push_str(&entries.join(",\n"));
    output.push_str("\n}\n```");
    output
}
