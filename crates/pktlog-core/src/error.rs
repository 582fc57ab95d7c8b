//! Error types for pktlog-core
//!
//! Centralized error handling using `thiserror` for ergonomic error definitions.

use thiserror::Error;

/// Main error type for pktlog-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The peer ended the session and gave a reason
    #[error("Peer disconnected: {reason}")]
    Disconnected {
        /// Reason sent by the peer
        reason: String,
    },

    /// The connection was closed locally or the peer went away silently
    #[error("Connection closed")]
    ConnectionClosed,

    /// The peer sent something that is not a valid packet
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Packet could not be rendered for logging
    #[error("Failed to render packet '{packet_type}': {message}")]
    Render {
        /// Type name of the packet
        packet_type: String,
        /// Serializer message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// Path to the missing config file
        path: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    ConfigValue {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    /// File watcher could not be set up
    #[error("Config watcher error: {0}")]
    Watch(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a disconnect error carrying the peer's reason
    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self::Disconnected {
            reason: reason.into(),
        }
    }

    /// Create a config value error
    pub fn config_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Reason given by the peer, if this error is a disconnect
    pub fn disconnect_reason(&self) -> Option<&str> {
        match self {
            Self::Disconnected { reason } => Some(reason),
            _ => None,
        }
    }
}

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        Self::Watch(err.to_string())
    }
}
