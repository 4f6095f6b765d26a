//! Bridge-level errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Failures surfaced by configuration loading, broker sinks and the runner.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The configuration path does not exist.
    #[error("Configuration file '{path}' does not exist")]
    ConfigNotFound { path: String },

    /// The file exists but is not valid JSON5 for this bridge.
    #[error("Cannot parse configuration: {0}")]
    ConfigParse(String),

    /// Parsed fine but a value is out of range or inconsistent.
    #[error("Configuration rejected: {0}")]
    ConfigValidation(String),

    /// The broker refused or dropped the initial connection.
    #[error("Broker connection for '{client_id}' failed: {message}")]
    Connect { client_id: String, message: String },

    /// No CONNACK within `connect_timeout_secs`.
    #[error("Broker connection for '{client_id}' timed out")]
    ConnectTimeout { client_id: String },

    #[error("Zenoh: {0}")]
    ZenohSession(String),

    #[error("Payload encoding: {0}")]
    Serialization(String),

    #[error("Publish to '{topic}' failed: {message}")]
    Publish { topic: String, message: String },

    /// The client did not accept the publish within `publish_timeout_ms`.
    #[error("Publish to '{topic}' timed out")]
    PublishTimeout { topic: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Shorthand used by [`BridgeConfig::validate`](crate::BridgeConfig::validate) implementations.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }
}

impl From<json5::Error> for BridgeError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

impl From<mibridge_common::Error> for BridgeError {
    fn from(err: mibridge_common::Error) -> Self {
        match err {
            mibridge_common::Error::Config(msg) => Self::Config(msg),
            mibridge_common::Error::Zenoh(e) => Self::ZenohSession(e.to_string()),
            mibridge_common::Error::Json(e) => Self::Serialization(e.to_string()),
            mibridge_common::Error::Io(e) => Self::Io(e),
        }
    }
}
