//! Configuration management for pktlog
//!
//! Provides a strongly-typed configuration system with TOML support. The
//! relay consumes it through [`ObservationSettings`], an immutable snapshot
//! of the parts that can change at runtime.

mod settings;

pub use settings::ObservationSettings;

use crate::error::{Error, Result};
use crate::observe::Cadence;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

/// Default listen address for clients
pub const DEFAULT_LOCAL_ADDRESS: &str = "0.0.0.0:19132";

/// Default report delay in milliseconds for both directions
pub const DEFAULT_REPORT_DELAY_MS: i64 = 5000;

/// Placeholder entry written when the filter list is empty
///
/// Contains characters no packet type name has, so it never matches.
pub const PACKET_TYPE_HINT: &str =
    "(packet type names are matched as case-sensitive substrings, e.g. \"ActorEvent\")";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Relay endpoints
    pub connection: ConnectionConfig,

    /// Packet logging settings
    pub packet_logger: PacketLoggerConfig,

    /// Hot reload settings
    pub reload: ReloadConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| Error::ConfigNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(Error::from)
    }

    /// Load the startup configuration, creating and normalizing the file
    ///
    /// Writes the default configuration when `path` does not exist, fills
    /// fallbacks for empty values and writes the result back so the file
    /// always shows every option. Any failure here is fatal to the caller.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            std::fs::write(path, Self::default().to_toml()?)?;
            info!(path = %path.display(), "Wrote default configuration");
        }

        let mut config = Self::load(path)?;
        config.apply_fallbacks();
        std::fs::write(path, config.to_toml()?)?;

        config.validate()?;
        Ok(config)
    }

    /// Fill values that must not stay empty
    pub fn apply_fallbacks(&mut self) {
        if self.connection.local_address.trim().is_empty() {
            self.connection.local_address = DEFAULT_LOCAL_ADDRESS.to_string();
        }
        if self.packet_logger.show_packet_type.is_empty() {
            self.packet_logger.show_packet_type = vec![PACKET_TYPE_HINT.to_string()];
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.connection
            .local_address
            .parse::<SocketAddr>()
            .map_err(|e| Error::config_value("connection.local_address", e.to_string()))?;

        let remote = self.connection.remote_address.trim();
        if remote.is_empty() {
            return Err(Error::config_value(
                "connection.remote_address",
                "Must be set to the host:port of the remote endpoint",
            ));
        }
        match remote.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
            _ => {
                return Err(Error::config_value(
                    "connection.remote_address",
                    format!("Expected host:port, got '{remote}'"),
                ))
            }
        }

        if self
            .packet_logger
            .show_packet_type
            .iter()
            .any(|entry| entry.is_empty())
        {
            return Err(Error::config_value(
                "packet_logger.show_packet_type",
                "Entries must not be empty strings (an empty entry would match every packet)",
            ));
        }

        Ok(())
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(Error::from)
    }

    /// Snapshot of the runtime-reloadable settings
    pub fn observation(&self) -> ObservationSettings {
        let delay = &self.packet_logger.report_hidden_packet_count_delay;
        ObservationSettings {
            filter_entries: self.packet_logger.show_packet_type.clone(),
            receive_cadence: Cadence::from_millis(delay.receive_ms),
            send_cadence: Cadence::from_millis(delay.send_ms),
            auto_reload: self.reload.config_auto_reload,
        }
    }
}

/// Relay endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Address clients connect to
    pub local_address: String,
    /// Remote endpoint each client is relayed to
    pub remote_address: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            local_address: DEFAULT_LOCAL_ADDRESS.to_string(),
            remote_address: String::new(),
        }
    }
}

/// Packet logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketLoggerConfig {
    /// Packet type substrings to log in full
    pub show_packet_type: Vec<String>,
    /// How often hidden packet counts are reported
    pub report_hidden_packet_count_delay: ReportDelayConfig,
}

impl Default for PacketLoggerConfig {
    fn default() -> Self {
        Self {
            show_packet_type: vec![
                "ActorEvent".to_string(),
                "ActorPickRequest".to_string(),
                PACKET_TYPE_HINT.to_string(),
            ],
            report_hidden_packet_count_delay: ReportDelayConfig::default(),
        }
    }
}

/// Hidden packet report delays, in milliseconds (`<= 0` disables)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportDelayConfig {
    /// Delay for packets from the remote endpoint
    pub receive_ms: i64,
    /// Delay for packets from the client
    pub send_ms: i64,
}

impl Default for ReportDelayConfig {
    fn default() -> Self {
        Self {
            receive_ms: DEFAULT_REPORT_DELAY_MS,
            send_ms: DEFAULT_REPORT_DELAY_MS,
        }
    }
}

/// Hot reload settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReloadConfig {
    /// Watch the config file and apply changes while running
    pub config_auto_reload: bool,
}
