use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use mibridge_common::{BrokerConfig, LoggingConfig, env_override};
use mibridge_framework::{BridgeConfig, BridgeError};

use crate::decoder::DeviceClass;
use crate::oid::parse_oids;

/// Root configuration for the SNMP bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnmpBridgeConfig {
    /// Broker connection settings.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Startup connection policy for SNMP sessions.
    #[serde(default)]
    pub connect: ConnectPolicy,

    /// Devices to poll. Defaults to the firewall and temperature sensor pair.
    #[serde(default = "default_targets")]
    pub targets: Vec<TargetConfig>,
}

impl Default for SnmpBridgeConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            logging: LoggingConfig::default(),
            connect: ConnectPolicy::default(),
            targets: default_targets(),
        }
    }
}

/// How a worker establishes its SNMP session at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectPolicy {
    /// Attempts before giving up, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt; doubles on each further failure.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound on the delay between attempts.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// What happens once every attempt failed.
    #[serde(default)]
    pub on_exhausted: ExhaustionPolicy,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    10_000
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            on_exhausted: ExhaustionPolicy::default(),
        }
    }
}

impl ConnectPolicy {
    /// Delay before the attempt following failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }
}

/// Escalation once a worker runs out of connection attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Stop only the affected worker.
    #[default]
    StopWorker,
    /// Shut the whole bridge down.
    Shutdown,
}

/// Configuration for a single monitored device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Target name, used in logs and the default MQTT client id.
    pub name: String,

    /// Decoder applied to this target's samples.
    pub class: DeviceClass,

    /// Device host name or IP address.
    #[serde(default)]
    pub address: String,

    /// Environment variable that overrides `address` when set.
    #[serde(default)]
    pub address_env: Option<String>,

    /// SNMP agent UDP port.
    #[serde(default = "default_snmp_port")]
    pub port: u16,

    /// SNMP version ("v1" or "v2c").
    #[serde(default)]
    pub version: SnmpVersion,

    /// SNMP community string.
    #[serde(default = "default_community")]
    pub community: String,

    /// Timeout of a single SNMP request.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Extra attempts for a request that timed out or failed in transport.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// OIDs read on every poll. Their order defines the decoded fields.
    pub oids: Vec<String>,

    /// MQTT client id; defaults to `<name>_mqtt_client`.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Topic override; defaults to the broker topic.
    #[serde(default)]
    pub topic: Option<String>,

    /// Pause between two polls.
    #[serde(default = "default_poll_delay")]
    pub poll_delay_ms: u64,
}

fn default_snmp_port() -> u16 {
    161
}

fn default_community() -> String {
    "public".to_string()
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_retries() -> u32 {
    3
}

fn default_poll_delay() -> u64 {
    50
}

/// SNMP protocol version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnmpVersion {
    #[serde(rename = "v1")]
    V1,
    #[default]
    #[serde(rename = "v2c")]
    V2c,
}

impl TargetConfig {
    /// Create a target with default protocol settings.
    pub fn new(name: impl Into<String>, class: DeviceClass, oids: Vec<String>) -> Self {
        Self {
            name: name.into(),
            class,
            address: String::new(),
            address_env: None,
            port: default_snmp_port(),
            version: SnmpVersion::default(),
            community: default_community(),
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            oids,
            client_id: None,
            topic: None,
            poll_delay_ms: default_poll_delay(),
        }
    }

    /// `host:port` for the agent, bracketing bare IPv6 addresses.
    pub fn socket_address(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }

    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("{}_mqtt_client", self.name.to_lowercase()))
    }

    /// Topic for this target's records.
    pub fn topic<'a>(&'a self, broker: &'a BrokerConfig) -> &'a str {
        self.topic.as_deref().unwrap_or(&broker.topic)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms)
    }

    /// Apply `address_env` if the variable is set.
    pub fn apply_env(&mut self) {
        if let Some(var) = self.address_env.clone() {
            env_override(&var, &mut self.address);
        }
    }
}

fn default_targets() -> Vec<TargetConfig> {
    let mut firewall = TargetConfig::new(
        "pfSense",
        DeviceClass::Interfaces,
        vec![
            "1.3.6.1.4.1.12325.1.200.1.8.2.1.2.1".to_string(),
            "1.3.6.1.4.1.12325.1.200.1.8.2.1.2.2".to_string(),
            "1.3.6.1.4.1.12325.1.200.1.8.2.1.2.3".to_string(),
        ],
    );
    firewall.address_env = Some("PFSENSE_IP".to_string());
    firewall.version = SnmpVersion::V2c;

    let mut sensor = TargetConfig::new(
        "avtech",
        DeviceClass::Temperature,
        vec![
            "1.3.6.1.4.1.20916.1.9.1.1.1.1.0".to_string(),
            "1.3.6.1.4.1.20916.1.9.1.1.1.2.0".to_string(),
            "1.3.6.1.4.1.20916.1.9.1.1.1.3.0".to_string(),
        ],
    );
    sensor.address_env = Some("AVTECH_IP".to_string());
    sensor.version = SnmpVersion::V1;

    vec![firewall, sensor]
}

impl SnmpBridgeConfig {
    /// The built-in targets, before environment overrides.
    pub fn builtin() -> mibridge_framework::Result<Self> {
        Self::parse_json5("{}")
    }

    /// Targets left without an address after overrides.
    ///
    /// These pass validation; their workers fail when connecting.
    pub fn unaddressed_targets(&self) -> impl Iterator<Item = &TargetConfig> {
        self.targets.iter().filter(|t| t.address.is_empty())
    }
}

impl BridgeConfig for SnmpBridgeConfig {
    fn broker(&self) -> &BrokerConfig {
        &self.broker
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn apply_env(&mut self) {
        self.broker.apply_env();
        for target in &mut self.targets {
            target.apply_env();
        }
    }

    fn validate(&self) -> mibridge_framework::Result<()> {
        if self.targets.is_empty() {
            return Err(BridgeError::validation("At least one target is required"));
        }

        if self.connect.max_attempts == 0 {
            return Err(BridgeError::validation(
                "connect.max_attempts must be at least 1",
            ));
        }

        let mut names = HashSet::new();
        for target in &self.targets {
            if target.name.is_empty() {
                return Err(BridgeError::validation("Target name cannot be empty"));
            }
            if !names.insert(target.name.as_str()) {
                return Err(BridgeError::validation(format!(
                    "Duplicate target name '{}'",
                    target.name
                )));
            }
            if target.timeout_ms == 0 {
                return Err(BridgeError::validation(format!(
                    "Target '{}' has a zero request timeout",
                    target.name
                )));
            }

            parse_oids(&target.oids).map_err(|e| {
                BridgeError::validation(format!("Target '{}': {}", target.name, e))
            })?;

            let expected = target.class.expected_width();
            if target.oids.len() != expected {
                return Err(BridgeError::validation(format!(
                    "Target '{}' ({}) needs exactly {} OIDs, got {}",
                    target.name,
                    target.class.as_str(),
                    expected,
                    target.oids.len()
                )));
            }
        }

        Ok(())
    }
}
