//! Request and response records of the Formation REST API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lowercase prefix of headers carrying data-store metadata.
pub const METADATA_HEADER_PREFIX: &str = "x-datastore-";

/// Separator for multi-valued metadata attributes; the service default.
pub const DEFAULT_AVU_DELIMITER: &str = ",";

/// Job type reported for interactive (VICE) apps.
pub const INTERACTIVE_JOB_TYPE: &str = "Interactive";

/// Free-form launch configuration, keyed by parameter id.
pub type LaunchConfig = Map<String, Value>;

// =========================================================================
// Login
// =========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

// =========================================================================
// Apps
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct App {
    pub id: String,
    pub name: String,
    pub system_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrator_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_job_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppListing {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub apps: Vec<App>,
}

/// One launch parameter of an app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(
        rename = "isVisible",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub is_visible: Option<bool>,
    #[serde(
        rename = "defaultValue",
        alias = "default_value",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub default_value: Option<Value>,
}

impl Parameter {
    /// Required unless explicitly hidden.
    pub fn is_required(&self) -> bool {
        self.required && self.is_visible != Some(false)
    }

    pub fn is_visible(&self) -> bool {
        self.is_visible != Some(false)
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.label.as_deref())
            .unwrap_or(&self.id)
    }

    pub fn type_name(&self) -> &str {
        self.param_type.as_deref().unwrap_or("string")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ParameterGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_job_type: Option<String>,
    #[serde(default)]
    pub groups: Vec<ParameterGroup>,
}

impl AppParameters {
    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.groups.iter().flat_map(|g| g.parameters.iter())
    }
}

// =========================================================================
// Analyses
// =========================================================================

#[derive(Debug, Clone, Serialize, Default)]
pub struct LaunchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<LaunchConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LaunchResponse {
    pub analysis_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisStatus {
    pub analysis_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub url_ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl AnalysisStatus {
    /// Ready URL, if the analysis is serving one.
    pub fn ready_url(&self) -> Option<&str> {
        if self.url_ready {
            self.url.as_deref().filter(|u| !u.is_empty())
        } else {
            None
        }
    }

    /// Terminal failure states that will never become ready.
    pub fn has_failed(&self) -> bool {
        matches!(self.status.as_str(), "Failed" | "Canceled")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Analysis {
    pub analysis_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AnalysisListing {
    #[serde(default)]
    pub analyses: Vec<Analysis>,
}

/// Lifecycle operations accepted by the analysis control endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOperation {
    ExtendTime,
    SaveAndExit,
    Exit,
}

impl ControlOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlOperation::ExtendTime => "extend_time",
            ControlOperation::SaveAndExit => "save_and_exit",
            ControlOperation::Exit => "exit",
        }
    }
}

impl std::fmt::Display for ControlOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =========================================================================
// Data store
// =========================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Collection,
    DataObject,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionListing {
    pub path: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default)]
    pub contents: Vec<CollectionEntry>,
}

impl CollectionListing {
    pub fn collections(&self) -> impl Iterator<Item = &CollectionEntry> {
        self.contents
            .iter()
            .filter(|e| e.entry_type == EntryType::Collection)
    }

    pub fn data_objects(&self) -> impl Iterator<Item = &CollectionEntry> {
        self.contents
            .iter()
            .filter(|e| e.entry_type == EntryType::DataObject)
    }
}

/// Raw file content plus the metadata headers that came with it.
#[derive(Debug, Clone, PartialEq)]
pub struct DataObject {
    pub path: String,
    pub content: Vec<u8>,
    /// Lowercase `x-datastore-*` header name -> value.
    pub metadata: BTreeMap<String, String>,
}

impl DataObject {
    /// Content as UTF-8 text, if it is text.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }

    /// Metadata keyed by attribute name (header prefix stripped).
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata.iter().map(|(k, v)| {
            (
                k.strip_prefix(METADATA_HEADER_PREFIX).unwrap_or(k),
                v.as_str(),
            )
        })
    }
}

/// What `GET /data/{path}` returned.
#[derive(Debug, Clone, PartialEq)]
pub enum DataNode {
    Collection(CollectionListing),
    Object(DataObject),
}

/// Query options of `GET /data/{path}`.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseOptions {
    pub offset: u64,
    pub limit: Option<u64>,
    pub include_metadata: bool,
    pub avu_delimiter: String,
}

impl Default for BrowseOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: None,
            include_metadata: false,
            avu_delimiter: DEFAULT_AVU_DELIMITER.to_string(),
        }
    }
}

/// Inputs of `PUT /data/{path}`.
#[derive(Debug, Clone)]
pub struct PutRequest {
    pub path: String,
    pub content: Option<Vec<u8>>,
    pub resource_type: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub replace_metadata: bool,
    pub avu_delimiter: String,
}

impl PutRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: None,
            resource_type: None,
            metadata: BTreeMap::new(),
            replace_metadata: false,
            avu_delimiter: DEFAULT_AVU_DELIMITER.to_string(),
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            resource_type: Some("directory".to_string()),
            ..Self::new(path)
        }
    }

    pub fn file(path: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            content: Some(content),
            ..Self::new(path)
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn replace_metadata(mut self, replace: bool) -> Self {
        self.replace_metadata = replace;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PutResult {
    pub path: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default)]
    pub created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeleteResult {
    pub path: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub would_delete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_count: Option<u64>,
}

impl DeleteResult {
    pub fn is_collection(&self) -> bool {
        self.node_type.as_deref() == Some("collection")
    }
}
