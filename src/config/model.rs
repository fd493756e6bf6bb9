// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Top-level daemon configuration as read from `/etc/watchcron.conf`.
///
/// The file is reserved and usually absent; every field has a default, so
/// an empty or missing file yields a fully usable configuration:
///
/// ```toml
/// [daemon]
/// max_concurrent_commands = 32
/// command_timeout_secs = 300
/// drain_timeout_secs = 30
/// user_table_dir = "/var/spool/watchcron"
/// system_table_dir = "/etc/watchcron.d"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub daemon: DaemonSection,
}

/// `[daemon]` section: runtime tunables and filesystem locations.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonSection {
    /// Upper bound on concurrently running commands.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_commands: usize,

    /// Wall-clock limit per command; the child is killed on expiry.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// How long shutdown waits for in-flight commands before killing them.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,

    /// Directory of per-user tables; file names are usernames.
    #[serde(default = "default_user_table_dir")]
    pub user_table_dir: PathBuf,

    /// Directory of system tables; their commands run as root.
    #[serde(default = "default_system_table_dir")]
    pub system_table_dir: PathBuf,

    #[serde(default = "default_allow_file")]
    pub allow_file: PathBuf,

    #[serde(default = "default_deny_file")]
    pub deny_file: PathBuf,

    /// Overridable on the command line with `-p`.
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,
}

fn default_max_concurrent() -> usize {
    32
}

fn default_command_timeout() -> u64 {
    300
}

fn default_drain_timeout() -> u64 {
    30
}

fn default_user_table_dir() -> PathBuf {
    PathBuf::from("/var/spool/watchcron")
}

fn default_system_table_dir() -> PathBuf {
    PathBuf::from("/etc/watchcron.d")
}

fn default_allow_file() -> PathBuf {
    PathBuf::from("/etc/watchcron.allow")
}

fn default_deny_file() -> PathBuf {
    PathBuf::from("/etc/watchcron.deny")
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("/var/run/watchcrond.pid")
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            max_concurrent_commands: default_max_concurrent(),
            command_timeout_secs: default_command_timeout(),
            drain_timeout_secs: default_drain_timeout(),
            user_table_dir: default_user_table_dir(),
            system_table_dir: default_system_table_dir(),
            allow_file: default_allow_file(),
            deny_file: default_deny_file(),
            pid_file: default_pid_file(),
        }
    }
}

impl DaemonSection {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}
