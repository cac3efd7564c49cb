//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use observability::LogFormat;
use std::path::PathBuf;

/// Segment Relay - telemetry ingestion relay with pluggable sinks
#[derive(Parser, Debug)]
#[command(
    name = "segment-relay",
    author,
    version,
    about = "Telemetry event ingestion relay",
    long_about = "Ingests analytics events, normalizes them and fans them out to the\n\
                  configured sinks, each with its own batching and backpressure policy.\n\n\
                  `run` replays newline-delimited submissions from a file or stdin."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        global = true,
        env = "SEGMENT_RELAY_VERBOSE"
    )]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (json, pretty, compact)
    #[arg(
        long,
        default_value = "pretty",
        global = true,
        env = "SEGMENT_RELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log level used when RUST_LOG is unset
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay submissions through the relay
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "relay.toml",
        env = "SEGMENT_RELAY_CONFIG"
    )]
    pub config: PathBuf,

    /// NDJSON submissions, one event or batch per line (stdin when omitted)
    #[arg(short, long, env = "SEGMENT_RELAY_INPUT")]
    pub input: Option<PathBuf>,

    /// Write key sent as request credential
    #[arg(long, env = "SEGMENT_RELAY_WRITE_KEY")]
    pub write_key: Option<String>,

    /// Per-submission timeout, e.g. "500ms" (none when omitted)
    #[arg(long, env = "SEGMENT_RELAY_TIMEOUT")]
    pub timeout: Option<String>,

    /// Validate configuration and exit without starting sinks
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "SEGMENT_RELAY_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}
