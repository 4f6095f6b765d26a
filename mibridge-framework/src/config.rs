//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{BridgeError, Result};
use crate::{BrokerConfig, LoggingConfig};

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// loading, environment overrides, validation, and access to the common
/// config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use mibridge_framework::{BridgeConfig, BrokerConfig, LoggingConfig};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub broker: BrokerConfig,
///     pub logging: LoggingConfig,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn broker(&self) -> &BrokerConfig {
///         &self.broker
///     }
///
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the broker configuration.
    fn broker(&self) -> &BrokerConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Apply environment variable overrides.
    ///
    /// Called by [`prepare`](Self::prepare) before validation. The default does nothing.
    fn apply_env(&mut self) {}

    /// Validate the configuration. Override to add custom validation.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Read and parse a JSON5 file. Overrides and validation are not applied yet.
    fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse_json5(&content)
    }

    /// Parse a JSON5 string. Overrides and validation are not applied yet.
    fn parse_json5(content: &str) -> Result<Self> {
        Ok(json5::from_str(content)?)
    }

    /// Apply environment overrides, then validate.
    ///
    /// [`BridgeRunner::from_args`](crate::BridgeRunner::from_args) calls this
    /// once logging is up, so override warnings are visible.
    fn prepare(mut self) -> Result<Self> {
        self.apply_env();
        self.validate()?;
        Ok(self)
    }
}
