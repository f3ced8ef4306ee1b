//! Configuration for rfsend.
//!
//! Provides:
//! - Config file discovery (CLI flag, env var, standard paths)
//! - TOML parsing with serde
//! - Environment variable overrides
//! - Validation of the sink target and buffer sizes

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::sink::SinkTarget;

/// Log file used when none is configured.
pub const DEFAULT_LOG_FILE: &str = "rfsend.log";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Complete publisher configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Sink endpoint settings
    pub sink: SinkSettings,

    /// Publish gate settings
    pub publish: PublishSettings,

    /// Buffer capacities
    pub buffers: BufferSettings,

    /// Logging settings
    pub logging: LoggingSettings,
}

/// Sink endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    /// Endpoint URL, e.g. "http://127.0.0.1:8086/write?db=sensors"
    pub url: String,

    /// Server type: REST or InfluxDB (case-insensitive)
    pub server_type: String,

    /// Per-request timeout in seconds; 0 waits as long as the server does
    pub timeout_secs: u64,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            server_type: "REST".to_string(),
            timeout_secs: 0,
        }
    }
}

impl SinkSettings {
    /// The configured timeout, when one is set.
    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }
}

/// Publish gate settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    /// Publish every reading, not only changed and valid ones
    pub send_all: bool,
}

/// Buffer capacities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSettings {
    /// Capacity of the outgoing payload buffer in bytes
    pub payload_capacity: usize,

    /// Capacity of the response capture buffer in bytes
    pub response_capacity: usize,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            payload_capacity: 8192,
            response_capacity: 8192,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level used when no -v flag is given: trace, debug, info, warn, error
    pub level: String,

    /// Persistent log file path; an empty value falls back to the default
    pub log_file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            log_file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl LoggingSettings {
    /// Effective log file path.
    pub fn log_file_path(&self) -> PathBuf {
        if self.log_file.is_empty() {
            PathBuf::from(DEFAULT_LOG_FILE)
        } else {
            PathBuf::from(&self.log_file)
        }
    }
}

impl SenderConfig {
    /// The validated sink target described by this configuration.
    pub fn sink_target(&self) -> ConfigResult<SinkTarget> {
        if self.sink.url.is_empty() {
            return Err(ConfigError::ValidationError(
                "Sink URL is required (--send-to or [sink] url)".to_string(),
            ));
        }
        SinkTarget::from_config(&self.sink.url, &self.sink.server_type)
    }
}

/// Configuration loader
pub struct ConfigLoader {
    /// Path to config file (if specified via CLI)
    cli_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self { cli_path: None }
    }

    /// Set the config path from CLI argument
    pub fn with_cli_path(mut self, path: Option<PathBuf>) -> Self {
        self.cli_path = path;
        self
    }

    /// Load configuration with the following precedence:
    /// 1. CLI --config flag
    /// 2. RFSEND_CONFIG environment variable
    /// 3. ~/.config/rfsend/config.toml
    /// 4. /etc/rfsend/config.toml
    /// 5. Default values
    ///
    /// Validation is the caller's job, after it has merged CLI flags on
    /// top of the loaded values.
    pub fn load(&self) -> ConfigResult<SenderConfig> {
        let config_path = self.find_config_file();

        let mut config = if let Some(path) = config_path {
            info!("Loading configuration from: {}", path.display());
            self.load_from_file(&path)?
        } else {
            debug!("No config file found, using defaults");
            SenderConfig::default()
        };

        self.apply_env_overrides(&mut config);

        Ok(config)
    }

    /// Find the config file to use
    fn find_config_file(&self) -> Option<PathBuf> {
        // 1. CLI --config flag
        if let Some(path) = &self.cli_path {
            if path.exists() {
                return Some(path.clone());
            }
            warn!("CLI config path does not exist: {}", path.display());
        }

        // 2. RFSEND_CONFIG environment variable
        if let Ok(env_path) = std::env::var("RFSEND_CONFIG") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
            warn!("RFSEND_CONFIG path does not exist: {}", env_path);
        }

        // 3. ~/.config/rfsend/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("rfsend").join("config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 4. /etc/rfsend/config.toml (Unix only)
        #[cfg(unix)]
        {
            let path = PathBuf::from("/etc/rfsend/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Load configuration from a TOML file
    fn load_from_file(&self, path: &Path) -> ConfigResult<SenderConfig> {
        let content = std::fs::read_to_string(path)?;
        let config: SenderConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, config: &mut SenderConfig) {
        if let Ok(val) = std::env::var("RFSEND_SINK_URL") {
            config.sink.url = val;
        }
        if let Ok(val) = std::env::var("RFSEND_SERVER_TYPE") {
            config.sink.server_type = val;
        }
        if let Ok(val) = std::env::var("RFSEND_TIMEOUT_SECS") {
            config.sink.timeout_secs = val.parse().unwrap_or(config.sink.timeout_secs);
        }
        if let Ok(val) = std::env::var("RFSEND_SEND_ALL") {
            config.publish.send_all = val.parse().unwrap_or(config.publish.send_all);
        }
        if let Ok(val) = std::env::var("RFSEND_PAYLOAD_CAPACITY") {
            config.buffers.payload_capacity =
                val.parse().unwrap_or(config.buffers.payload_capacity);
        }
        if let Ok(val) = std::env::var("RFSEND_RESPONSE_CAPACITY") {
            config.buffers.response_capacity =
                val.parse().unwrap_or(config.buffers.response_capacity);
        }
        if let Ok(val) = std::env::var("RFSEND_LOG_LEVEL") {
            config.logging.level = val;
        }
        if let Ok(val) = std::env::var("RFSEND_LOG_FILE") {
            config.logging.log_file = val;
        }
    }

    /// Validate configuration
    pub fn validate(&self, config: &SenderConfig) -> ConfigResult<()> {
        // Sink URL and server type
        config.sink_target()?;

        // Log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                config.logging.level, valid_levels
            )));
        }

        // Buffer capacities
        if config.buffers.payload_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "Payload buffer capacity cannot be 0".to_string(),
            ));
        }
        if config.buffers.response_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "Response buffer capacity cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper module for platform-specific directories
mod dirs {
    use std::path::PathBuf;

    /// Get the user's config directory
    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        }

        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".config"))
                })
        }

        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }
}
