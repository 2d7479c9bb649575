//! # Configuration Management
//!
//! Centralized configuration for the IPC client.
//!
//! This module provides structured configuration for the client session,
//! the local transport and logging, including timeouts, retry policy and
//! payload limits.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Timing Defaults
//! - Receive poll: 1s, which bounds how long shutdown takes to be noticed
//! - Retry backoff: 1s between application send attempts
//! - Close grace: 25ms between the `Close` frame and tearing down the socket

use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Protocol version announced in the handshake
pub const PROTOCOL_VERSION: i32 = 1;

/// Max allowed frame body size (16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Max nesting of objects and lists accepted by the parser
pub const MAX_NESTING_DEPTH: usize = 128;

/// Number of retries after the first attempt for application sends
pub const DEFAULT_MAX_SEND_RETRIES: u32 = 3;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct IpcConfig {
    /// Session configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl IpcConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Override fields from `DISCORD_IPC_*` environment variables.
    ///
    /// Unparsable numeric values are ignored.
    pub fn apply_env(&mut self) {
        if let Ok(client_id) = std::env::var("DISCORD_IPC_CLIENT_ID") {
            self.client.client_id = client_id;
        }

        if let Ok(endpoint) = std::env::var("DISCORD_IPC_ENDPOINT") {
            if !endpoint.is_empty() {
                self.transport.endpoint = Some(PathBuf::from(endpoint));
            }
        }

        if let Ok(poll) = std::env::var("DISCORD_IPC_POLL_TIMEOUT_MS") {
            if let Ok(val) = poll.parse::<u64>() {
                self.client.poll_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(backoff) = std::env::var("DISCORD_IPC_RETRY_BACKOFF_MS") {
            if let Ok(val) = backoff.parse::<u64>() {
                self.client.retry_backoff = Duration::from_millis(val);
            }
        }

        if let Ok(retries) = std::env::var("DISCORD_IPC_MAX_SEND_RETRIES") {
            if let Ok(val) = retries.parse::<u32>() {
                self.client.max_send_retries = val;
            }
        }
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.client.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Application (client) ID sent in the handshake
    pub client_id: String,

    /// Protocol version sent in the handshake
    pub protocol_version: i32,

    /// How long the receive task waits for a frame before re-checking for shutdown
    #[serde(with = "duration_serde")]
    pub poll_timeout: Duration,

    /// Delay between application send attempts
    #[serde(with = "duration_serde")]
    pub retry_backoff: Duration,

    /// Retries after the first attempt for activity updates
    pub max_send_retries: u32,

    /// Pause between sending `Close` and closing the socket
    #[serde(with = "duration_serde")]
    pub close_grace: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            protocol_version: PROTOCOL_VERSION,
            poll_timeout: timeout::RECV_POLL_TIMEOUT,
            retry_backoff: timeout::RETRY_BACKOFF,
            max_send_retries: DEFAULT_MAX_SEND_RETRIES,
            close_grace: timeout::CLOSE_GRACE,
        }
    }
}

impl ClientConfig {
    /// Shorthand for a default configuration with `client_id` set
    pub fn with_client_id(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.client_id.is_empty() {
            errors.push("Client ID cannot be empty".to_string());
        } else if !self.client_id.bytes().all(|b| b.is_ascii_digit()) {
            errors.push(format!(
                "Invalid client ID: '{}' (expected a numeric application ID)",
                self.client_id
            ));
        }

        if self.protocol_version < 1 {
            errors.push(format!(
                "Invalid protocol version: {} (must be at least 1)",
                self.protocol_version
            ));
        }

        if self.poll_timeout.as_millis() < 10 {
            errors.push("Poll timeout too short (minimum: 10ms)".to_string());
        } else if self.poll_timeout.as_secs() > 60 {
            errors.push("Poll timeout too long (maximum: 60s)".to_string());
        }

        if self.retry_backoff.as_secs() > 60 {
            errors.push("Retry backoff too long (maximum: 60s)".to_string());
        }

        if self.max_send_retries > 100 {
            errors.push(format!(
                "Max send retries too large: {} (maximum: 100)",
                self.max_send_retries
            ));
        }

        if self.close_grace.as_secs() > 10 {
            errors.push("Close grace period too long (maximum: 10s)".to_string());
        }

        errors
    }
}

/// Transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Explicit socket or pipe path; discovered automatically when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<PathBuf>,

    /// Timeout for establishing the connection
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            connect_timeout: timeout::CONNECT_TIMEOUT,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Some(ref endpoint) = self.endpoint {
            if endpoint.as_os_str().is_empty() {
                errors.push("Endpoint path cannot be empty".to_string());
            }
        }

        if self.connect_timeout.as_millis() < 10 {
            errors.push("Connect timeout too short (minimum: 10ms)".to_string());
        } else if self.connect_timeout.as_secs() > 60 {
            errors.push("Connect timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,

    /// Whether to include span enter/exit events
    pub log_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("discord-ipc"),
            log_level: Level::INFO,
            json_format: false,
            log_spans: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
