//! Configuration handling for the FloatChat MCP server.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use crate::db::PoolSettings;
use crate::tools::ToolSettings;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 3003;
pub const DEFAULT_MCP_ENDPOINT: &str = "/mcp";
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CHART_BASE_URL: &str = "https://quickchart.io/chart";

// Pool defaults, sized for a small hosted PostgreSQL plan
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30;

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    Stdio,
    /// Streamable HTTP (for hosted agents)
    #[default]
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Configuration for the FloatChat MCP server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "floatchat-mcp",
    about = "MCP server exposing oceanographic float-profile tools over a PostgreSQL store",
    version,
    author
)]
pub struct Config {
    /// Database connection URL (postgres://... or sqlite:...)
    #[arg(long = "database-url", value_name = "URL", env = "DATABASE_URL")]
    pub database_url: String,

    /// Transport mode (stdio or http)
    #[arg(short, long, value_enum, default_value = "http", env = "MCP_TRANSPORT")]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "MCP_HTTP_HOST")]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(long = "port", default_value_t = DEFAULT_HTTP_PORT, env = "PORT")]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(long, default_value = DEFAULT_MCP_ENDPOINT, env = "MCP_ENDPOINT")]
    pub mcp_endpoint: String,

    /// Maximum pooled database connections
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS, env = "MCP_MAX_CONNECTIONS")]
    pub max_connections: u32,

    /// Close idle connections after this many seconds
    #[arg(long, default_value_t = DEFAULT_IDLE_TIMEOUT_SECS, env = "MCP_IDLE_TIMEOUT")]
    pub idle_timeout: u64,

    /// Fail connection attempts and pool waits after this many seconds
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS, env = "MCP_CONNECT_TIMEOUT")]
    pub connect_timeout: u64,

    /// Per-statement timeout in seconds
    #[arg(long, default_value_t = DEFAULT_QUERY_TIMEOUT_SECS, env = "MCP_QUERY_TIMEOUT")]
    pub query_timeout: u64,

    /// Skip the liveness check on pooled connections before use
    #[arg(long, env = "MCP_NO_KEEP_ALIVE")]
    pub no_keep_alive: bool,

    /// Directory for export artifacts (default: system temp directory)
    #[arg(long, value_name = "DIR", env = "MCP_EXPORT_DIR")]
    pub export_dir: Option<PathBuf>,

    /// Base URL of the QuickChart-compatible chart renderer
    #[arg(long, default_value = DEFAULT_CHART_BASE_URL, env = "MCP_CHART_BASE_URL")]
    pub chart_base_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            database_url: String::new(),
            transport: TransportMode::Http,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            no_keep_alive: false,
            export_dir: None,
            chart_base_url: DEFAULT_CHART_BASE_URL.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.database_url.trim().is_empty() {
            return Err("DATABASE_URL must be set".to_string());
        }
        if self.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }
        if self.idle_timeout == 0 {
            return Err("idle_timeout must be greater than 0".to_string());
        }
        if self.connect_timeout == 0 {
            return Err("connect_timeout must be greater than 0".to_string());
        }
        if self.query_timeout == 0 {
            return Err("query_timeout must be greater than 0".to_string());
        }
        if !self.mcp_endpoint.starts_with('/') {
            return Err(format!(
                "mcp_endpoint must start with '/' (got '{}')",
                self.mcp_endpoint
            ));
        }
        Url::parse(&self.chart_base_url)
            .map_err(|e| format!("Invalid chart base URL '{}': {e}", self.chart_base_url))?;
        Ok(())
    }

    /// Pool settings derived from the CLI options.
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            idle_timeout: Duration::from_secs(self.idle_timeout),
            connect_timeout: self.connect_timeout_duration(),
            keep_alive: !self.no_keep_alive,
        }
    }

    /// Settings handed to the tool catalog.
    pub fn tool_settings(&self) -> Result<ToolSettings, String> {
        let chart_base_url = Url::parse(&self.chart_base_url)
            .map_err(|e| format!("Invalid chart base URL '{}': {e}", self.chart_base_url))?;
        Ok(ToolSettings {
            export_dir: self
                .export_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            chart_base_url,
        })
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
