//! Data Store Tools
//!
//! Tools for browsing and modifying the hierarchical data store.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Deserialize;
use serde_json::Value;

use super::{metadata_strings, parse_params, service_error};
use crate::formation::models::DEFAULT_AVU_DELIMITER;
use crate::formation::{
    BrowseOptions, CollectionListing, DataNode, DataObject, DeleteResult, PutRequest,
};
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

/// Register data store tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(browse_data_tool());
    registry.register_tool(create_directory_tool());
    registry.register_tool(upload_file_tool());
    registry.register_tool(set_metadata_tool());
    registry.register_tool(delete_data_tool());
}

fn default_avu_delimiter() -> String {
    DEFAULT_AVU_DELIMITER.to_string()
}

// ============================================================================
// browse_data
// ============================================================================

#[derive(Debug, Deserialize)]
struct BrowseDataParams {
    path: String,
    #[serde(default)]
    offset: u64,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    include_metadata: bool,
    #[serde(default = "default_avu_delimiter")]
    avu_delimiter: String,
}

fn browse_data_tool() -> RegisteredTool {
    ToolBuilder::new("browse_data")
        .description(
            "Browse a data store directory or read a file. Directories return their \
             contents, files return their content.",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Full data store path (e.g. '/iplant/home/username/file.txt')"
                },
                "offset": {
                    "type": "integer",
                    "description": "Byte offset for file reading (default 0)",
                    "minimum": 0
                },
                "limit": {
                    "type": "integer",
                    "description": "Max bytes to read for files",
                    "minimum": 1
                },
                "include_metadata": {
                    "type": "boolean",
                    "description": "Include AVU metadata (default false)"
                },
                "avu_delimiter": {
                    "type": "string",
                    "description": "Separator for multi-valued metadata (default ',')"
                }
            },
            "required": ["path"]
        }))
        .build(browse_data_handler)
}

async fn browse_data_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: BrowseDataParams = parse_params(params)?;
    let options = BrowseOptions {
        offset: params.offset,
        limit: params.limit,
        include_metadata: params.include_metadata,
        avu_delimiter: params.avu_delimiter,
    };

    match ctx.api().browse(&params.path, &options).await {
        Ok(DataNode::Collection(listing)) => Ok(ToolsCallResult::text(format_listing(&listing))),
        Ok(DataNode::Object(object)) => Ok(ToolsCallResult::text(format_data_object(&object))),
        Err(e) => Ok(service_error("browse_data", &e)),
    }
}

pub(crate) fn format_listing(listing: &CollectionListing) -> String {
    let mut output = format!("**Directory:** `{}`\n\n", listing.path);
    if listing.contents.is_empty() {
        output.push_str("*(empty directory)*");
        return output;
    }

    let dirs: Vec<_> = listing.collections().collect();
    if !dirs.is_empty() {
        output.push_str("**Directories:**\n");
        for dir in dirs {
            let _ = writeln!(output, "- 📁 {}", dir.name);
        }
        output.push('\n');
    }

    let files: Vec<_> = listing.data_objects().collect();
    if !files.is_empty() {
        output.push_str("**Files:**\n");
        for file in files {
            let _ = writeln!(output, "- 📄 {}", file.name);
        }
    }
    output
}

pub(crate) fn format_data_object(object: &DataObject) -> String {
    let mut output = match object.text() {
        Some(text) => format!("**File Content:**\n\n```\n{}\n```", text),
        None => format!(
            "**Binary File:** {} bytes\n\n*(Content cannot be displayed as text)*",
            object.content.len()
        ),
    };

    if !object.metadata.is_empty() {
        output.push_str("\n\n**Metadata:**\n");
        for (attribute, value) in object.attributes() {
            let _ = writeln!(output, "- {}: {}", title_case(attribute), value);
        }
    }
    output
}

/// `"file-type"` -> `"File Type"`.
fn title_case(attribute: &str) -> String {
    attribute
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

// ============================================================================
// create_directory
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreateDirectoryParams {
    path: String,
    #[serde(default)]
    metadata: Option<BTreeMap<String, Value>>,
}

fn metadata_property(description: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "description": description,
        "additionalProperties": {"type": ["string", "number", "boolean"]}
    })
}

fn create_directory_tool() -> RegisteredTool {
    ToolBuilder::new("create_directory")
        .description("Create a new directory in the data store")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Full path of the new directory (e.g. '/iplant/home/username/newdir')"
                },
                "metadata": metadata_property("Optional metadata as key-value pairs")
            },
            "required": ["path"]
        }))
        .build(create_directory_handler)
}

async fn create_directory_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: CreateDirectoryParams = parse_params(params)?;
    let request = PutRequest::directory(params.path)
        .with_metadata(metadata_strings(params.metadata.unwrap_or_default()));

    match ctx.api().put(&request).await {
        Ok(result) => Ok(ToolsCallResult::text(format!(
            "✅ Directory created: `{}`",
            result.path
        ))),
        Err(e) => Ok(service_error("create_directory", &e)),
    }
}

// ============================================================================
// upload_file
// ============================================================================

#[derive(Debug, Deserialize)]
struct UploadFileParams {
    path: String,
    content: String,
    #[serde(default)]
    metadata: Option<BTreeMap<String, Value>>,
}

fn upload_file_tool() -> RegisteredTool {
    ToolBuilder::new("upload_file")
        .description("Upload a text file to the data store, replacing any existing content")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Full path of the file (e.g. '/iplant/home/username/file.txt')"
                },
                "content": {
                    "type": "string",
                    "description": "File content"
                },
                "metadata": metadata_property("Optional metadata as key-value pairs")
            },
            "required": ["path", "content"]
        }))
        .build(upload_file_handler)
}

async fn upload_file_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: UploadFileParams = parse_params(params)?;
    let request = PutRequest::file(params.path, params.content.into_bytes())
        .with_metadata(metadata_strings(params.metadata.unwrap_or_default()));

    match ctx.api().put(&request).await {
        Ok(result) => {
            let verb = if result.created { "created" } else { "updated" };
            Ok(ToolsCallResult::text(format!(
                "✅ File {}: `{}`",
                verb, result.path
            )))
        }
        Err(e) => Ok(service_error("upload_file", &e)),
    }
}

// ============================================================================
// set_metadata
// ============================================================================

#[derive(Debug, Deserialize)]
struct SetMetadataParams {
    path: String,
    metadata: BTreeMap<String, Value>,
    #[serde(default)]
    replace: bool,
}

fn set_metadata_tool() -> RegisteredTool {
    ToolBuilder::new("set_metadata")
        .description("Add or replace metadata on an existing file or directory")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Full path of the file or directory"
                },
                "metadata": metadata_property("Metadata as key-value pairs"),
                "replace": {
                    "type": "boolean",
                    "description": "Replace all existing metadata instead of adding to it (default false)"
                }
            },
            "required": ["path", "metadata"]
        }))
        .build(set_metadata_handler)
}

async fn set_metadata_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: SetMetadataParams = parse_params(params)?;
    if params.metadata.is_empty() {
        return Err(McpError::InvalidParams(
            "metadata must contain at least one attribute".to_string(),
        ));
    }

    let request = PutRequest::new(params.path)
        .with_metadata(metadata_strings(params.metadata))
        .replace_metadata(params.replace);

    match ctx.api().put(&request).await {
        Ok(result) => {
            let verb = if params.replace { "replaced" } else { "updated" };
            Ok(ToolsCallResult::text(format!(
                "✅ Metadata {} for: `{}`",
                verb, result.path
            )))
        }
        Err(e) => Ok(service_error("set_metadata", &e)),
    }
}

// ============================================================================
// delete_data
// ============================================================================

#[derive(Debug, Deserialize)]
struct DeleteDataParams {
    path: String,
    #[serde(default)]
    recurse: bool,
    #[serde(default)]
    dry_run: bool,
}

fn delete_data_tool() -> RegisteredTool {
    ToolBuilder::new("delete_data")
        .description(
            "Delete a file or directory from the data store. Deletions are permanent; \
             use dry_run=true to preview first.",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Full path of the file or directory to delete"
                },
                "recurse": {
                    "type": "boolean",
                    "description": "Delete non-empty directories (default false)"
                },
                "dry_run": {
                    "type": "boolean",
                    "description": "Preview the deletion without performing it (default false)"
                }
            },
            "required": ["path"]
        }))
        .build(delete_data_handler)
}

async fn delete_data_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: DeleteDataParams = parse_params(params)?;

    match ctx
        .api()
        .delete(&params.path, params.recurse, params.dry_run)
        .await
    {
        Ok(result) => Ok(ToolsCallResult::text(format_delete_result(
            &result,
            params.recurse,
        ))),
        Err(e) => Ok(service_error("delete_data", &e)),
    }
}

pub(crate) fn format_delete_result(result: &DeleteResult, recurse: bool) -> String {
    let item_count = result.item_count.filter(|n| *n > 0);

    if result.dry_run {
        let action = if result.would_delete {
            "Would delete"
        } else {
            "Cannot delete"
        };
        let mut output = format!("🔍 Dry-run: {} `{}`", action, result.path);
        if let (true, Some(count)) = (result.is_collection(), item_count) {
            let _ = write!(output, " ({} items)", count);
        }
        return output;
    }

    let (icon, action) = match (result.deleted, recurse && result.is_collection()) {
        (true, true) => ("⚠️", "Deleted (recursive)"),
        (true, false) => ("✅", "Deleted"),
        (false, _) => ("❌", "Failed to delete"),
    };
    let mut output = format!("{} {}: `{}`", icon, action, result.path);
    if let Some(count) = item_count {
        let _ = write!(output, " ({} items)", count);
    }
    output
}
