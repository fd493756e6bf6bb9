// src/daemon/pidfile.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

/// Write the daemon's PID file; the returned guard removes it on drop.
///
/// A stale PID file left by a crashed instance is overwritten, never a
/// reason to refuse startup.
pub fn write(path: &Path) -> Result<PidFileGuard> {
    if path.exists() {
        debug!(path = ?path, "overwriting stale PID file");
    }

    let pid = std::process::id();
    fs::write(path, format!("{pid}\n"))
        .with_context(|| format!("writing PID file {:?}", path))?;

    info!(pid, path = ?path, "PID file written");
    Ok(PidFileGuard {
        path: path.to_path_buf(),
    })
}

/// Removes the PID file when dropped (clean exit).
#[derive(Debug)]
pub struct PidFileGuard {
    path: PathBuf,
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            debug!(path = ?self.path, error = %err, "failed to remove PID file");
        }
    }
}
