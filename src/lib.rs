// src/lib.rs

pub mod cli;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod permissions;
pub mod table;
pub mod watch;

use std::fs;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::cli::CliArgs;
use crate::daemon::{pidfile, Supervisor};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the root-privilege check and directory setup
/// - PID file handling
/// - the supervisor (watch engine + dispatcher + executor + signal loop)
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = config::load_or_default(&args.config)?;
    let mut settings = cfg.daemon;
    if let Some(pid_file) = args.pid_file {
        settings.pid_file = pid_file;
    }

    // Commands run under arbitrary user credentials, which requires root.
    if !permissions::is_root() {
        bail!("watchcrond must be run as root");
    }

    fs::create_dir_all(&settings.user_table_dir)
        .with_context(|| format!("creating user table dir {:?}", settings.user_table_dir))?;
    fs::create_dir_all(&settings.system_table_dir)
        .with_context(|| format!("creating system table dir {:?}", settings.system_table_dir))?;

    let _pid_guard = pidfile::write(&settings.pid_file)?;

    info!(version = VERSION, "watchcrond starting");
    let supervisor = Supervisor::new(settings)?;
    supervisor.run().await
}
