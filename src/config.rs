//! Configuration module for the logdrill harness.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values. All defaults
//! reproduce the canonical scenario, so the binary runs with no
//! arguments at all.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the harness
#[derive(Parser, Debug)]
#[command(name = "logdrill")]
#[command(author = "logdrill authors")]
#[command(version = "0.1.0")]
#[command(about = "A concurrent TCP/UDP client harness for a logging server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Target host the sessions connect to (e.g., 127.0.0.1)
    #[arg(long)]
    pub host: Option<String>,

    /// TCP target ports, one stream session per port (e.g., 6666,6667)
    #[arg(long, value_delimiter = ',')]
    pub tcp_ports: Option<Vec<u16>>,

    /// UDP target port shared by both datagram sessions
    #[arg(long)]
    pub udp_port: Option<u16>,

    /// Number of pool workers (execution slots for sessions)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Grace period in milliseconds for cooperative shutdown
    #[arg(long)]
    pub grace_ms: Option<u64>,

    /// Bound in milliseconds for forced cancellation to settle
    #[arg(long)]
    pub cancel_wait_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Target endpoint configuration
#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    /// Host the sessions connect to
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP target ports, one stream session per port
    #[serde(default = "default_tcp_ports")]
    pub tcp_ports: Vec<u16>,
    /// UDP target port shared by both datagram sessions
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            tcp_ports: default_tcp_ports(),
            udp_port: default_udp_port(),
        }
    }
}

/// Pool and shutdown configuration
#[derive(Debug, Deserialize)]
pub struct PoolConfig {
    /// Number of execution slots for sessions
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Grace period for cooperative shutdown, in milliseconds
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
    /// Bound for forced cancellation to settle, in milliseconds
    #[serde(default = "default_cancel_wait_ms")]
    pub cancel_wait_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            grace_ms: default_grace_ms(),
            cancel_wait_ms: default_cancel_wait_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_tcp_ports() -> Vec<u16> {
    vec![6666, 6667]
}

fn default_udp_port() -> u16 {
    6668
}

fn default_workers() -> usize {
    4
}

fn default_grace_ms() -> u64 {
    30_000
}

fn default_cancel_wait_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub tcp_ports: Vec<u16>,
    pub udp_port: u16,
    pub workers: usize,
    pub grace: Duration,
    pub cancel_wait: Duration,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();
        Self::resolve(cli)
    }

    fn resolve(cli: CliArgs) -> Result<Self, ConfigError> {
        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        // Merge CLI args with TOML config (CLI takes precedence)
        let config = Config {
            host: cli.host.unwrap_or(toml_config.target.host),
            tcp_ports: cli.tcp_ports.unwrap_or(toml_config.target.tcp_ports),
            udp_port: cli.udp_port.unwrap_or(toml_config.target.udp_port),
            workers: cli.workers.unwrap_or(toml_config.pool.workers),
            grace: Duration::from_millis(cli.grace_ms.unwrap_or(toml_config.pool.grace_ms)),
            cancel_wait: Duration::from_millis(
                cli.cancel_wait_ms.unwrap_or(toml_config.pool.cancel_wait_ms),
            ),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        };

        if config.tcp_ports.is_empty() {
            return Err(ConfigError::Invalid("tcp_ports must not be empty".into()));
        }
        if config.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }

        Ok(config)
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Invalid(reason) => {
                write!(f, "Invalid configuration: {}", reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
