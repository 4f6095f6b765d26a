//! mibridge Common Library
//!
//! Shared types and utilities for the mibridge telemetry bridges:
//!
//! - [`config`] - Configuration types and environment overrides
//! - [`serialization`] - JSON payload encoding, including full-precision integers
//! - [`session`] - Zenoh session management
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod serialization;
pub mod session;

// Re-export commonly used types at the crate root
pub use config::{BrokerConfig, BrokerKind, LogFormat, LoggingConfig, ZenohConfig, env_override};
pub use error::{Error, Result};
pub use serialization::{decode, encode};
pub use session::open_zenoh;

/// Install the global tracing subscriber.
///
/// The level comes from `RUST_LOG` when it is set, else from `config.level`.
/// `format: "json"` emits one JSON object per event.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| Error::Config(format!("Invalid log level '{}': {}", config.level, e)))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Text => registry.with(fmt::layer()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };

    installed.map_err(|e| Error::Config(format!("Tracing already initialized: {}", e)))
}
