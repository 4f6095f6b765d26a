//! mibridge Bridge Framework
//!
//! Common abstractions for building bridges that poll devices and publish
//! records to a broker.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading, overrides and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (workers, shutdown, signal handling)
//! - [`PublishSink`] with MQTT and Zenoh implementations, plus per-connection [`LifecycleHooks`]
//! - [`BridgeArgs`] for common CLI argument parsing

mod args;
mod config;
mod env_file;
mod error;
mod publisher;
mod runner;

pub use args::BridgeArgs;
pub use config::BridgeConfig;
pub use env_file::EnvFile;
pub use error::{BridgeError, Result};
pub use publisher::{
    Envelope, LifecycleHooks, LoggingHooks, MqttPublisher, PublishSink, Publisher, ZenohPublisher,
};
pub use runner::BridgeRunner;

// Re-export commonly used types from mibridge-common
pub use mibridge_common::{BrokerConfig, BrokerKind, LogFormat, LoggingConfig, ZenohConfig};
