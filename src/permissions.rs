// src/permissions.rs

//! The allow/deny permission gate and OS user database helpers.

use std::fs;
use std::path::{Path, PathBuf};

use nix::unistd::{geteuid, User};

use crate::errors::PermissionError;

/// Decides whether a named user may have rules dispatched.
///
/// Policy, in order:
/// 1. If the allow file exists, the user is permitted iff listed in it.
/// 2. Else, if the deny file exists, the user is permitted iff NOT listed.
/// 3. Else, all users are permitted.
///
/// File existence is authoritative: a missing file is not the same as an
/// empty one, and when the allow file exists the deny file is never
/// consulted.
#[derive(Debug, Clone)]
pub struct PermissionGate {
    allow_file: PathBuf,
    deny_file: PathBuf,
}

impl PermissionGate {
    pub fn new(allow_file: impl Into<PathBuf>, deny_file: impl Into<PathBuf>) -> Self {
        Self {
            allow_file: allow_file.into(),
            deny_file: deny_file.into(),
        }
    }

    /// Evaluate the gate for `username`. Read errors on an existing file
    /// surface as errors; they never silently permit.
    pub fn permitted(&self, username: &str) -> Result<bool, PermissionError> {
        if self.allow_file.exists() {
            return listed(&self.allow_file, username);
        }
        if self.deny_file.exists() {
            return Ok(!listed(&self.deny_file, username)?);
        }
        Ok(true)
    }
}

/// Whether `username` appears in a line-oriented user list file. `#`
/// comments and blank lines are ignored; matching is exact.
fn listed(path: &Path, username: &str) -> Result<bool, PermissionError> {
    let contents = fs::read_to_string(path).map_err(|source| PermissionError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == username {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Whether the current process runs with root privileges.
pub fn is_root() -> bool {
    geteuid().is_root()
}

/// Look up a user in the OS user database. Returns `None` for unknown users
/// and for lookup failures alike; callers treat both as "no such principal".
pub fn lookup_user(username: &str) -> Option<User> {
    User::from_name(username).ok().flatten()
}
