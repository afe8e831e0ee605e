//! # Configuration Management
//!
//! Centralized configuration for the wire core.
//!
//! This module provides structured configuration for the netpuncher
//! rendezvous, the request client, stream framing and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! Configuration documents are the main consumer of the forgiving INI/TOML
//! reading rules elsewhere in this crate: unknown keys warn, absent keys
//! default, and only structurally broken values fail.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

use crate::error::{Result, WireError};
use crate::net::frame::DEFAULT_MAX_FRAME;
use crate::net::puncher::PUNCHER_VERSION;

/// Default UDP port of the game wire protocol.
pub const DEFAULT_GAME_PORT: u16 = 11113;

/// Default port a netpuncher relay listens on.
pub const DEFAULT_PUNCHER_PORT: u16 = 11115;

/// Main configuration structure containing all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct WireConfig {
    /// Netpuncher rendezvous configuration
    #[serde(default)]
    pub puncher: PuncherConfig,

    /// Request client configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Transport-boundary configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WireConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| WireError::Config(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| WireError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| WireError::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(address) = std::env::var("WIREPACK_PUNCHER_ADDRESS") {
            config.puncher.address = address;
        }

        if let Ok(timeout) = std::env::var("WIREPACK_REQUEST_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.client.request_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(max_frame) = std::env::var("WIREPACK_MAX_FRAME_BYTES") {
            if let Ok(val) = max_frame.parse::<usize>() {
                config.transport.max_frame_bytes = val;
            }
        }

        Ok(config)
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

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.puncher.validate());
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
            Err(WireError::Config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Netpuncher rendezvous configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PuncherConfig {
    /// Relay endpoint, as `host:port` / `[ipv6]:port`
    pub address: String,

    /// Protocol version to speak; packets with any other version are
    /// not recognized
    pub version: u8,

    /// How long to keep punching before giving up
    #[serde(with = "duration_serde")]
    pub punch_timeout: Duration,

    /// Interval between punch retries
    #[serde(with = "duration_serde")]
    pub retry_interval: Duration,
}

impl Default for PuncherConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{DEFAULT_PUNCHER_PORT}"),
            version: PUNCHER_VERSION,
            punch_timeout: Duration::from_secs(10),
            retry_interval: Duration::from_millis(500),
        }
    }
}

impl PuncherConfig {
    /// Validate puncher configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Puncher address cannot be empty".to_string());
        }

        if self.version != PUNCHER_VERSION {
            errors.push(format!(
                "Unsupported puncher protocol version: {} (supported: {PUNCHER_VERSION})",
                self.version
            ));
        }

        if self.punch_timeout.as_millis() == 0 {
            errors.push("Punch timeout cannot be 0".to_string());
        }

        if self.retry_interval > self.punch_timeout {
            errors.push("Retry interval cannot exceed the punch timeout".to_string());
        }

        errors
    }
}

/// Request client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Timeout for one whole request
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// Maximum response body size in bytes
    pub max_response_size: usize,

    /// User agent string sent with requests
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_response_size: 4 * 1024 * 1024,
            user_agent: String::from("wirepack"),
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.request_timeout.as_millis() == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        } else if self.request_timeout > Duration::from_secs(300) {
            errors.push(format!(
                "Request timeout too long: {}s (maximum recommended: 300s)",
                self.request_timeout.as_secs()
            ));
        }

        if self.max_response_size == 0 {
            errors.push("Max response size cannot be 0".to_string());
        }

        if self.user_agent.is_empty() {
            errors.push("User agent cannot be empty".to_string());
        }

        errors
    }
}

/// Transport-boundary configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Game wire port for datagram traffic
    pub game_port: u16,

    /// Maximum frame payload on stream transports
    pub max_frame_bytes: usize,

    /// Whether to disconnect peers that repeatedly send undecodable
    /// packets instead of only dropping them
    pub kick_repeat_offenders: bool,

    /// Undecodable packets tolerated per peer before a kick
    pub offender_threshold: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            game_port: DEFAULT_GAME_PORT,
            max_frame_bytes: DEFAULT_MAX_FRAME,
            kick_repeat_offenders: true,
            offender_threshold: 8,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_frame_bytes == 0 {
            errors.push("Max frame size cannot be 0".to_string());
        } else if self.max_frame_bytes < 1024 {
            errors.push("Max frame size too small (minimum: 1 KB)".to_string());
        } else if self.max_frame_bytes > 16 * 1024 * 1024 {
            errors.push(format!(
                "Max frame size too large: {} bytes (maximum recommended: 16 MB)",
                self.max_frame_bytes
            ));
        }

        if self.kick_repeat_offenders && self.offender_threshold == 0 {
            errors.push("Offender threshold cannot be 0 when kicking is enabled".to_string());
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

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to render received packets into the text format at trace
    /// level (costly; debugging only)
    pub trace_packets: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("wirepack"),
            log_level: Level::INFO,
            log_to_console: true,
            trace_packets: false,
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

        if self.trace_packets && self.log_level < Level::TRACE {
            errors.push("trace_packets has no effect above the trace log level".to_string());
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

// ==========================================
// TESTS
// ==========================================
