//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Camera Bridge - simulated camera frame/calibration bridge
#[derive(Parser, Debug)]
#[command(
    name = "camera-bridge",
    author,
    version,
    about = "Simulated camera bridge",
    long_about = "Bridges a simulated camera image stream to an output channel.\n\n\
                  Subscribes to an image source, buffers the latest frame, publishes it \n\
                  with its calibration on a fixed cadence, and dispatches to configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CAMERA_BRIDGE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "CAMERA_BRIDGE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bridge
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the initial camera state derived from a configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "bridge.toml",
        env = "CAMERA_BRIDGE_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the source locator from configuration
    #[arg(long, env = "CAMERA_BRIDGE_LOCATOR")]
    pub locator: Option<String>,

    /// Override the publish period (milliseconds)
    #[arg(long, env = "CAMERA_BRIDGE_PERIOD_MS")]
    pub period_ms: Option<u64>,

    /// Maximum number of frames to publish (0 = unlimited)
    #[arg(long, default_value = "0", env = "CAMERA_BRIDGE_MAX_FRAMES")]
    pub max_frames: u64,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "CAMERA_BRIDGE_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Capacity of the dispatcher input queue
    #[arg(long, default_value = "64", env = "CAMERA_BRIDGE_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "CAMERA_BRIDGE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "bridge.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "bridge.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_overrides() {
        let cli = Cli::try_parse_from([
            "camera-bridge",
            "-v",
            "run",
            "--config",
            "cam.toml",
            "--locator",
            "~/rear/image",
            "--period-ms",
            "10",
            "--max-frames",
            "5",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.config, PathBuf::from("cam.toml"));
        assert_eq!(args.locator.as_deref(), Some("~/rear/image"));
        assert_eq!(args.period_ms, Some(10));
        assert_eq!(args.max_frames, 5);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["camera-bridge", "-q", "-v", "validate"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_info_json_flag() {
        let cli = Cli::try_parse_from(["camera-bridge", "info", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Info(InfoArgs { json: true, .. })));
    }
}
