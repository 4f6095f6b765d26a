//! Bridge SNMP devices to MQTT.

use anyhow::{Context, Result};
use mibridge_framework::{BridgeArgs, BridgeConfig, BridgeError, BridgeRunner};

use mibridge_snmp::config::SnmpBridgeConfig;
use mibridge_snmp::worker::run_target;

const DEFAULT_CONFIG: &str = "mibridge.json5";

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse_with_default(DEFAULT_CONFIG);

    // A missing default file means "run the built-in targets".
    // Overrides and validation happen in `from_args`, once logging is up.
    let (config, builtin) = match SnmpBridgeConfig::read(&args.config) {
        Ok(config) => (config, false),
        Err(BridgeError::ConfigNotFound { .. }) if args.is_default_config(DEFAULT_CONFIG) => {
            let config = SnmpBridgeConfig::builtin().context("Invalid built-in configuration")?;
            (config, true)
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to load config from {}", args.config.display()));
        }
    };

    let mut runner = BridgeRunner::from_args("snmp", config, &args)?;

    if builtin {
        tracing::warn!(
            config = %args.config.display(),
            "Configuration file not found, using built-in targets"
        );
    }

    for target in runner.config().unaddressed_targets() {
        tracing::warn!(
            device = %target.name,
            address_env = ?target.address_env,
            "Target has no address configured"
        );
    }

    let max_ticks = args.once.then_some(1);
    let broker = runner.config().broker().clone();
    let policy = runner.config().connect;
    let targets = runner.config().targets.clone();

    tracing::info!(
        host = %broker.host,
        port = broker.port,
        targets = targets.len(),
        "Starting SNMP workers"
    );

    for target in targets {
        let name = target.name.clone();
        let cancel = runner.worker_token();
        let shutdown = runner.shutdown_token();
        runner.spawn(
            name,
            run_target(target, broker.clone(), policy, cancel, shutdown, max_ticks),
        );
    }

    runner.run().await?;

    Ok(())
}
