//! Bridge runner for lifecycle management.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use mibridge_common::{LoggingConfig, init_tracing};

use crate::BridgeArgs;
use crate::EnvFile;
use crate::config::BridgeConfig;
use crate::error::Result;

/// Bridge runner that manages the lifecycle of a protocol bridge.
///
/// Handles:
/// - Logging initialization
/// - Worker spawning and the completion barrier
/// - Graceful shutdown on Ctrl+C / SIGTERM through a cancellation token
///
/// Workers are independent: one finishing or failing does not stop the
/// others, and nothing restarts it. [`run`](Self::run) returns once every
/// worker has finished, or once shutdown was requested and the workers have
/// drained.
///
/// # Example
///
/// ```ignore
/// use mibridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let args = BridgeArgs::parse_with_default("mybridge.json5");
///     let config = MyBridgeConfig::read(&args.config)?;
///
///     let mut runner = BridgeRunner::from_args("mybridge", config, &args)?;
///
///     let token = runner.worker_token();
///     runner.spawn("worker-1", async move {
///         // Worker logic here, stopping when `token` is cancelled
///         Ok::<(), anyhow::Error>(())
///     });
///
///     Ok(runner.run().await?)
/// }
/// ```
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging.
    name: String,
    /// Bridge version.
    version: String,
    /// The loaded configuration.
    config: C,
    /// Root cancellation token; cancelling it stops every worker.
    shutdown: CancellationToken,
    /// How long workers get to finish after shutdown is requested.
    shutdown_timeout: Duration,
    /// Spawned workers.
    workers: JoinSet<()>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a new bridge runner. Logging is left untouched.
    pub fn new(name: impl Into<String>, config: C) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            config,
            shutdown: CancellationToken::new(),
            shutdown_timeout: Duration::from_secs(5),
            workers: JoinSet::new(),
        }
    }

    /// Create a new bridge runner and initialize logging.
    ///
    /// `--log-level` from the CLI overrides the configured level. The config
    /// is expected straight from [`BridgeConfig::read`]. Once the subscriber
    /// is installed, `.env` is loaded, then environment overrides and
    /// validation run.
    pub fn from_args(name: impl Into<String>, config: C, args: &BridgeArgs) -> Result<Self> {
        let log_config = match &args.log_level {
            Some(level) => LoggingConfig {
                level: level.clone(),
                ..config.logging().clone()
            },
            None => config.logging().clone(),
        };

        init_tracing(&log_config)?;
        EnvFile::load().log();

        let config = config
            .prepare()
            .inspect_err(|e| tracing::error!(error = %e, "Invalid configuration"))?;

        let runner = Self::new(name, config);
        tracing::info!(bridge = %runner.name, version = %runner.version, "Starting bridge");

        Ok(runner)
    }

    /// Set how long workers may take to stop after shutdown is requested.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Token for a single worker. Cancelled on bridge shutdown.
    pub fn worker_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Root token. Cancelling it shuts the whole bridge down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawn a worker task.
    ///
    /// Errors are logged; they do not affect other workers.
    pub fn spawn<F, E>(&mut self, name: impl Into<String>, future: F)
    where
        F: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let name = name.into();
        self.workers.spawn(async move {
            match future.await {
                Ok(()) => tracing::info!(worker = %name, "Worker finished"),
                Err(e) => tracing::error!(worker = %name, error = %e, "Worker failed"),
            }
        });
    }

    /// Run the bridge until every worker has finished or shutdown is requested.
    ///
    /// This will:
    /// 1. Listen for Ctrl+C / SIGTERM and cancel the root token on either
    /// 2. Wait for workers to finish (the completion barrier)
    /// 3. On shutdown, give workers `shutdown_timeout` to stop, then abort the rest
    pub async fn run(mut self) -> Result<()> {
        let listener = tokio::spawn(listen_for_shutdown(self.shutdown.clone()));

        tracing::info!(
            bridge = %self.name,
            workers = self.workers.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        let mut shutting_down = false;
        while !shutting_down {
            tokio::select! {
                joined = self.workers.join_next() => match joined {
                    Some(result) => log_join(result),
                    None => break,
                },
                _ = self.shutdown.cancelled() => shutting_down = true,
            }
        }

        if shutting_down {
            tracing::info!(bridge = %self.name, "Shutdown requested");
            self.drain().await;
        }

        listener.abort();

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(())
    }

    async fn drain(&mut self) {
        let workers = &mut self.workers;
        let drained = tokio::time::timeout(self.shutdown_timeout, async {
            while let Some(result) = workers.join_next().await {
                log_join(result);
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = self.workers.len(),
                "Workers did not stop in time, aborting"
            );
            self.workers.abort_all();
            while self.workers.join_next().await.is_some() {}
        }
    }
}

fn log_join(result: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!(error = %e, "Worker panicked");
        } else {
            tracing::debug!(error = %e, "Worker aborted");
        }
    }
}

async fn listen_for_shutdown(token: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                return;
            }
            tracing::info!("Received Ctrl+C");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM");
        }
    }

    token.cancel();
}
