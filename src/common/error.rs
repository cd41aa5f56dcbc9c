//! Error types for the application.

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    IoError { path: String, message: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed:\n{message}")]
    ValidationError { message: String },

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// BattlEye RCon protocol and session errors.
#[derive(Debug, Error)]
pub enum RconError {
    #[error("Invalid packet: {message}")]
    InvalidPacket { message: String },

    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Authentication failed: {reason}")]
    AuthFailed { reason: String },

    #[error("Failed to connect to {host}:{port}: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("No response from server for {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Not connected to the RCon server")]
    NotConnected,

    #[error("RCon client is not running")]
    ClientGone,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from outbound relay actions (sending, renaming).
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Channel '{channel}' cannot be renamed (not a voice or stage channel)")]
    NotRenamable { channel: String },

    #[error("Discord error: {0}")]
    Discord(#[from] serenity::Error),
}

/// Result type alias for RCon operations.
pub type RconResult<T> = std::result::Result<T, RconError>;

/// Result type alias for relay operations.
pub type RelayResult<T> = std::result::Result<T, RelayError>;
