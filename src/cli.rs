// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `watchcrond`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "watchcrond",
    version,
    about = "Run table-declared commands on inotify filesystem events.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the daemon config file.
    #[arg(
        short = 'f',
        long = "config",
        value_name = "PATH",
        default_value = "/etc/watchcron.conf"
    )]
    pub config: PathBuf,

    /// Stay in the foreground (do not daemonize).
    #[arg(short = 'n', long)]
    pub foreground: bool,

    /// PID file path (overrides the config file).
    #[arg(short = 'p', long = "pid-file", value_name = "PATH")]
    pub pid_file: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WATCHCRON_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
