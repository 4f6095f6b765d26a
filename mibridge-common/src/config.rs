use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Common Zenoh connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZenohConfig {
    /// Zenoh mode: "client", "peer", or "router".
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Endpoints to connect to (for client mode).
    #[serde(default)]
    pub connect: Vec<String>,

    /// Endpoints to listen on (for peer/router mode).
    #[serde(default)]
    pub listen: Vec<String>,
}

fn default_mode() -> String {
    "peer".to_string()
}

impl Default for ZenohConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            connect: Vec::new(),
            listen: Vec::new(),
        }
    }
}

/// Which broker transport the publish sinks use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    /// MQTT broker (default).
    #[default]
    Mqtt,
    /// Zenoh network.
    Zenoh,
}

/// Broker connection settings shared by every worker.
///
/// Each worker opens its own connection from these settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker transport.
    #[serde(default)]
    pub kind: BrokerKind,

    /// MQTT broker host.
    #[serde(default = "default_host")]
    pub host: String,

    /// MQTT broker port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Topic every record is published to unless a target overrides it.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// MQTT keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// How long to wait for the broker to acknowledge the connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Upper bound on a single publish call.
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_ms: u64,

    /// Pause before the MQTT event loop tries again after losing the connection.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,

    /// Optional MQTT username.
    #[serde(default)]
    pub username: Option<String>,

    /// Optional MQTT password.
    #[serde(default)]
    pub password: Option<String>,

    /// Zenoh settings, used when `kind` is "zenoh".
    #[serde(default)]
    pub zenoh: ZenohConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_topic() -> String {
    "test".to_string()
}

fn default_keep_alive() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_publish_timeout() -> u64 {
    1000
}

fn default_reconnect_delay() -> u64 {
    1000
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            kind: BrokerKind::default(),
            host: default_host(),
            port: default_port(),
            topic: default_topic(),
            keep_alive_secs: default_keep_alive(),
            connect_timeout_secs: default_connect_timeout(),
            publish_timeout_ms: default_publish_timeout(),
            reconnect_delay_ms: default_reconnect_delay(),
            username: None,
            password: None,
            zenoh: ZenohConfig::default(),
        }
    }
}

impl BrokerConfig {
    /// Apply `MQTT_BROKER_IP` and `MQTT_BROKER_PORT` from the environment.
    pub fn apply_env(&mut self) {
        env_override("MQTT_BROKER_IP", &mut self.host);
        env_override("MQTT_BROKER_PORT", &mut self.port);
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Overwrite `target` with the parsed value of environment variable `var`.
///
/// Returns `true` when the variable was present and parsed. A missing
/// variable leaves `target` untouched; a malformed one is logged and
/// `target` keeps its current value.
pub fn env_override<T>(var: &str, target: &mut T) -> bool
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Ok(raw) = std::env::var(var) else {
        return false;
    };

    apply_override(var, &raw, target)
}

fn apply_override<T>(var: &str, raw: &str, target: &mut T) -> bool
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = raw.trim();
    if raw.is_empty() {
        tracing::warn!(var = %var, "Environment variable is empty, keeping configured value");
        return false;
    }

    match raw.parse::<T>() {
        Ok(value) => {
            *target = value;
            true
        }
        Err(e) => {
            tracing::warn!(
                var = %var,
                value = %raw,
                error = %e,
                "Malformed environment variable, keeping configured value"
            );
            false
        }
    }
}
