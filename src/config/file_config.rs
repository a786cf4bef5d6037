use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Settings read from the TOML config file. Every field is optional.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    // Connection
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub request_timeout: Option<u64>,

    // Workflow
    pub poll_interval: Option<u64>,

    // Observability
    pub log_level: Option<String>,
    pub log_json: Option<bool>,
    pub metrics_addr: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Load the explicitly given file, or the first default location that exists.
    ///
    /// An explicit path must exist; missing default files are not an error.
    pub fn discover(explicit: Option<&Path>) -> Result<Option<(PathBuf, Self)>> {
        if let Some(path) = explicit {
            return Ok(Some((path.to_path_buf(), Self::load(path)?)));
        }

        for path in default_paths() {
            if path.is_file() {
                let config = Self::load(&path)?;
                return Ok(Some((path, config)));
            }
        }
        Ok(None)
    }
}

/// `~/.formation-mcp.toml`, then `~/.config/formation-mcp/config.toml`.
pub fn default_paths() -> Vec<PathBuf> {
    match BaseDirs::new() {
        Some(dirs) => {
            let home = dirs.home_dir();
            vec![
                home.join(".formation-mcp.toml"),
                home.join(".config").join("formation-mcp").join("config.toml"),
            ]
        }
        None => Vec::new(),
    }
}
