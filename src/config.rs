//! Configuration module for order-rtt.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the latency harness
#[derive(Parser, Debug)]
#[command(name = "order-rtt")]
#[command(author = "order-rtt authors")]
#[command(version = "0.1.0")]
#[command(about = "Round-trip latency harness for order-submission engines", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Engine host
    #[arg(long)]
    pub host: Option<String>,

    /// Engine port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Number of orders to submit
    #[arg(short = 'n', long)]
    pub count: Option<u64>,

    /// Per-read/write timeout in milliseconds
    #[arg(short = 't', long)]
    pub timeout_ms: Option<u64>,

    /// Connect timeout in milliseconds
    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,

    /// Log a checkpoint every N completed orders (0 disables)
    #[arg(short = 'r', long)]
    pub report_interval: Option<u64>,

    /// I/O backend
    #[arg(long, value_enum)]
    pub runtime: Option<RuntimeType>,

    /// Seed for the order generator (random if unset)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// I/O backend used for the engine connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    /// Blocking socket with kernel timeouts
    #[default]
    Blocking,
    /// Non-blocking socket driven by mio (epoll/kqueue)
    Mio,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Engine endpoint
#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Load shape
#[derive(Debug, Deserialize)]
pub struct SessionSection {
    /// Orders to submit
    #[serde(default = "default_count")]
    pub count: u64,
    /// Per-read/write timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Checkpoint interval in completed orders
    #[serde(default = "default_report_interval")]
    pub report_interval: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            count: default_count(),
            timeout_ms: default_timeout_ms(),
            report_interval: default_report_interval(),
        }
    }
}

/// Synthetic order distribution
#[derive(Debug, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_price_min")]
    pub price_min: i64,
    #[serde(default = "default_price_max")]
    pub price_max: i64,
    #[serde(default = "default_qty_min")]
    pub qty_min: u64,
    #[serde(default = "default_qty_max")]
    pub qty_max: u64,
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            price_min: default_price_min(),
            price_max: default_price_max(),
            qty_min: default_qty_min(),
            qty_max: default_qty_max(),
            seed: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RuntimeConfig {
    #[serde(default, rename = "type")]
    pub kind: RuntimeType,
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

fn default_port() -> u16 {
    6666
}

fn default_connect_timeout_ms() -> u64 {
    2000
}

fn default_count() -> u64 {
    200_000
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_report_interval() -> u64 {
    10_000
}

fn default_price_min() -> i64 {
    95
}

fn default_price_max() -> i64 {
    105
}

fn default_qty_min() -> u64 {
    1
}

fn default_qty_max() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub count: u64,
    pub timeout: Duration,
    pub report_interval: u64,
    pub runtime: RuntimeType,
    pub price_min: i64,
    pub price_max: i64,
    pub qty_min: u64,
    pub qty_max: u64,
    pub seed: Option<u64>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args over TOML values and validate the result.
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let config = Config {
            host: cli.host.unwrap_or(toml_config.target.host),
            port: cli.port.unwrap_or(toml_config.target.port),
            connect_timeout: Duration::from_millis(
                cli.connect_timeout_ms
                    .unwrap_or(toml_config.target.connect_timeout_ms),
            ),
            count: cli.count.unwrap_or(toml_config.session.count),
            timeout: Duration::from_millis(
                cli.timeout_ms.unwrap_or(toml_config.session.timeout_ms),
            ),
            report_interval: cli
                .report_interval
                .unwrap_or(toml_config.session.report_interval),
            runtime: cli.runtime.unwrap_or(toml_config.runtime.kind),
            price_min: toml_config.generator.price_min,
            price_max: toml_config.generator.price_max,
            qty_min: toml_config.generator.qty_min,
            qty_max: toml_config.generator.qty_max,
            seed: cli.seed.or(toml_config.generator.seed),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.count == 0 {
            return Err(ConfigError::Invalid("count must be at least 1".into()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be positive".into()));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid("connect timeout must be positive".into()));
        }
        if self.price_min > self.price_max {
            return Err(ConfigError::Invalid(format!(
                "price_min {} exceeds price_max {}",
                self.price_min, self.price_max
            )));
        }
        if self.qty_min == 0 || self.qty_min > self.qty_max {
            return Err(ConfigError::Invalid(format!(
                "quantity range {}..={} must be non-empty and positive",
                self.qty_min, self.qty_max
            )));
        }
        Ok(())
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
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
