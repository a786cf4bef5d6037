mod file_config;

pub use file_config::{default_paths, FileConfig};

use anyhow::Result;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::formation::{Credentials, FormationError};

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config_path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub poll_interval: Option<u64>,
    pub request_timeout: Option<u64>,
    pub log_level: Option<String>,
    pub log_json: Option<bool>,
    pub metrics_addr: Option<String>,
}

/// Values read from environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub poll_interval: Option<u64>,
    pub log_level: Option<String>,
    pub log_json: Option<bool>,
    pub metrics_addr: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let poll_interval = match get("FORMATION_POLL_INTERVAL") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
                config_error(format!("FORMATION_POLL_INTERVAL is not a number: {}", raw))
            })?),
            None => None,
        };
        let log_json = match get("LOG_JSON") {
            Some(raw) => Some(
                parse_bool(&raw)
                    .ok_or_else(|| config_error(format!("LOG_JSON is not a boolean: {}", raw)))?,
            ),
            None => None,
        };

        Ok(Self {
            base_url: get("FORMATION_BASE_URL"),
            token: get("FORMATION_TOKEN"),
            username: get("FORMATION_USERNAME"),
            password: get("FORMATION_PASSWORD"),
            poll_interval,
            log_level: get("LOG_LEVEL"),
            log_json,
            metrics_addr: get("METRICS_ADDR"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub credentials: Credentials,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub log_level: LogLevel,
    pub log_json: bool,
    pub metrics_addr: Option<SocketAddr>,
    /// File the settings were partly read from, if any.
    pub config_file: Option<PathBuf>,
}

impl AppConfig {
    /// Load the environment and config file, then resolve against the CLI values.
    pub fn load(cli: &CliConfig) -> Result<Self> {
        let env = EnvConfig::from_env()?;
        let discovered = FileConfig::discover(cli.config_path.as_deref())?;
        let (config_file, file) = match discovered {
            Some((path, file)) => (Some(path), Some(file)),
            None => (None, None),
        };

        let mut config = Self::resolve(cli, &env, file)?;
        config.config_file = config_file;
        Ok(config)
    }

    /// Merge the sources: CLI over environment over file over defaults.
    pub fn resolve(cli: &CliConfig, env: &EnvConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let base_url = cli
            .base_url
            .clone()
            .or_else(|| env.base_url.clone())
            .or(file.base_url)
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                config_error(
                    "base URL must be set via --base-url, FORMATION_BASE_URL or the config file",
                )
            })?;

        let credentials = resolve_credentials(
            layered(cli.token.clone(), env.token.clone(), file.token),
            layered(cli.username.clone(), env.username.clone(), file.username),
            layered(cli.password.clone(), env.password.clone(), file.password),
        )?;

        let poll_interval = cli
            .poll_interval
            .or(env.poll_interval)
            .or(file.poll_interval)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        if poll_interval == 0 {
            return Err(config_error("poll interval must be at least 1 second"));
        }

        let request_timeout = cli
            .request_timeout
            .or(file.request_timeout)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout == 0 {
            return Err(config_error("request timeout must be at least 1 second"));
        }

        let raw_level = cli
            .log_level
            .clone()
            .or_else(|| env.log_level.clone())
            .or(file.log_level);
        let log_level = match raw_level {
            Some(raw) => LogLevel::parse(&raw).ok_or_else(|| {
                config_error(format!(
                    "invalid log level {:?} (expected debug, info, warn or error)",
                    raw
                ))
            })?,
            None => LogLevel::default(),
        };

        let log_json = cli.log_json.or(env.log_json).or(file.log_json).unwrap_or(false);

        let metrics_addr = match cli
            .metrics_addr
            .clone()
            .or_else(|| env.metrics_addr.clone())
            .or(file.metrics_addr)
        {
            Some(raw) => Some(raw.parse::<SocketAddr>().map_err(|_| {
                config_error(format!("invalid metrics address: {}", raw))
            })?),
            None => None,
        };

        Ok(AppConfig {
            base_url,
            credentials,
            poll_interval: Duration::from_secs(poll_interval),
            request_timeout: Duration::from_secs(request_timeout),
            log_level,
            log_json,
            metrics_addr,
            config_file: None,
        })
    }
}

/// Source rank of a layered value: 0 = CLI, 1 = environment, 2 = file.
type Ranked = Option<(String, u8)>;

/// The highest-precedence non-empty value, with the rank of its source.
fn layered(cli: Option<String>, env: Option<String>, file: Option<String>) -> Ranked {
    let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
    non_empty(cli)
        .map(|v| (v, 0))
        .or_else(|| non_empty(env).map(|v| (v, 1)))
        .or_else(|| non_empty(file).map(|v| (v, 2)))
}

/// A token and a login pair from the same or a lower-precedence source are
/// both kept; a login pair given at a higher-precedence source than the
/// token replaces it.
fn resolve_credentials(token: Ranked, username: Ranked, password: Ranked) -> Result<Credentials> {
    let login_rank = match (&username, &password) {
        (Some((_, u)), Some((_, p))) => Some((*u).max(*p)),
        _ => None,
    };
    let token = match (token, login_rank) {
        (Some((_, token_rank)), Some(login_rank)) if login_rank < token_rank => None,
        (token, _) => token.map(|(value, _)| value),
    };

    Ok(Credentials::from_parts(
        token,
        username.map(|(value, _)| value),
        password.map(|(value, _)| value),
    )?)
}

fn config_error(message: impl Into<String>) -> anyhow::Error {
    FormationError::Configuration(message.into()).into()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
