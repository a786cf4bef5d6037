use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use formation_mcp::config::{self, AppConfig};
use formation_mcp::formation::FormationClient;
use formation_mcp::mcp::{tools, McpServer, ToolContext, ToolSettings};
use formation_mcp::metrics;
use formation_mcp::workflows::{FormationWorkflows, SystemBrowserOpener};

/// MCP server exposing the Formation API as tools over stdin/stdout.
#[derive(Parser, Debug)]
#[clap(version)]
struct CliArgs {
    /// Path to a TOML configuration file. Defaults to ~/.formation-mcp.toml
    /// or ~/.config/formation-mcp/config.toml when present.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Base URL of the Formation service.
    #[clap(long)]
    pub base_url: Option<String>,

    /// Pre-obtained bearer token. Takes precedence over username/password.
    #[clap(long)]
    pub token: Option<String>,

    /// Username used to obtain and refresh tokens.
    #[clap(long)]
    pub username: Option<String>,

    /// Password used to obtain and refresh tokens.
    #[clap(long)]
    pub password: Option<String>,

    /// Seconds between status checks while waiting for an interactive app.
    #[clap(long)]
    pub poll_interval: Option<u64>,

    /// Timeout in seconds for each request to the Formation service.
    #[clap(long)]
    pub request_timeout: Option<u64>,

    /// One of debug, info, warn, error.
    #[clap(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[clap(long)]
    pub log_json: bool,

    /// Address to serve Prometheus metrics on (e.g. 127.0.0.1:9464).
    #[clap(long)]
    pub metrics_addr: Option<String>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            config_path: args.config.clone(),
            base_url: args.base_url.clone(),
            token: args.token.clone(),
            username: args.username.clone(),
            password: args.password.clone(),
            poll_interval: args.poll_interval,
            request_timeout: args.request_timeout,
            log_level: args.log_level.clone(),
            log_json: args.log_json.then_some(true),
            metrics_addr: args.metrics_addr.clone(),
        }
    }
}

/// Logs go to stderr: stdout carries the MCP messages.
fn init_tracing(app_config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(app_config.log_level.as_filter());

    let (json_layer, text_layer) = if app_config.log_json {
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
            None,
        )
    } else {
        (
            None,
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .context("Failed to initialize logging")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = AppConfig::load(&cli_config)?;

    init_tracing(&app_config)?;

    info!("Starting {}", formation_mcp::mcp::handler::server_version());
    if let Some(path) = &app_config.config_file {
        info!("Configuration loaded from {:?}", path);
    }
    info!("  base_url: {}", app_config.base_url);
    info!("  credentials: {:?}", app_config.credentials);
    info!("  poll_interval: {}s", app_config.poll_interval.as_secs());

    metrics::init_metrics();
    if let Some(addr) = app_config.metrics_addr {
        tokio::spawn(async move {
            if let Err(e) = metrics::serve_metrics(addr).await {
                error!("Metrics server stopped: {}", e);
            }
        });
    }

    let client = FormationClient::new(
        &app_config.base_url,
        app_config.credentials.clone(),
        app_config.request_timeout,
    )?;
    let workflows = FormationWorkflows::new(Arc::new(client), Arc::new(SystemBrowserOpener));
    let context = ToolContext::new(
        Arc::new(workflows),
        ToolSettings {
            poll_interval: app_config.poll_interval,
        },
    );

    let mut server = McpServer::new(Arc::new(tools::default_registry()), context);
    server
        .serve_stdio()
        .await
        .context("MCP stdio transport failed")?;

    info!("Shutting down");
    Ok(())
}
