//! CLI argument parsing for bridges.

use std::path::PathBuf;

use clap::Parser;

/// Common CLI arguments for all bridges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeArgs {
    /// Path to configuration file.
    pub config: PathBuf,

    /// Log level given on the command line, if any.
    pub log_level: Option<String>,

    /// Run a single poll cycle per worker, then exit.
    pub once: bool,
}

/// Command line as typed; the config path is resolved afterwards.
#[derive(Parser, Debug)]
#[command(about = "mibridge telemetry bridge")]
struct Cli {
    /// Path to configuration file (JSON5).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Run a single poll cycle per worker, then exit.
    #[arg(long)]
    once: bool,
}

impl BridgeArgs {
    /// Parse CLI arguments with a default config path.
    ///
    /// If no `--config` argument is provided, uses the default.
    pub fn parse_with_default(default_config: &str) -> Self {
        Self::parse_from_with_default(std::env::args_os(), default_config)
    }

    /// Parse the given arguments with a default config path.
    pub fn parse_from_with_default<I, T>(args: I, default_config: &str) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::from_cli(Cli::parse_from(args), default_config)
    }

    /// Like [`parse_from_with_default`](Self::parse_from_with_default), but
    /// returns usage errors instead of exiting.
    pub fn try_parse_from_with_default<I, T>(
        args: I,
        default_config: &str,
    ) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_cli(Cli::try_parse_from(args)?, default_config))
    }

    fn from_cli(cli: Cli, default_config: &str) -> Self {
        Self {
            config: cli.config.unwrap_or_else(|| PathBuf::from(default_config)),
            log_level: cli.log_level,
            once: cli.once,
        }
    }

    /// Whether the config path is still the default one.
    pub fn is_default_config(&self, default_config: &str) -> bool {
        self.config == PathBuf::from(default_config)
    }
}
