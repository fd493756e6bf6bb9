// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Structured errors cover the domain layers (parsing, permissions, watch
//! registration, admission, execution); `anyhow` is used at the application
//! boundary where errors are only reported, not matched on.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors from parsing a single table line.
///
/// Every variant carries the 1-based source line number so table loading can
/// report exactly where a table file went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: invalid format, expected: <path> <mask> <command>")]
    BadFieldCount { line: usize },

    #[error("line {line}: unknown event mask: {token}")]
    UnknownMask { line: usize, token: String },

    #[error("line {line}: unknown option: {key}")]
    UnknownOption { line: usize, key: String },

    #[error("line {line}: invalid value for {key}: {value} (expected true/false)")]
    BadOptionValue {
        line: usize,
        key: String,
        value: String,
    },

    #[error("line {line}: no valid event mask specified")]
    EmptyMask { line: usize },

    #[error("line {line}: path must be absolute: {path}")]
    RelativePath { line: usize, path: String },

    #[error("line {line}: command cannot be empty")]
    EmptyCommand { line: usize },
}

/// Failure to *evaluate* the permission gate. A clean "denied" verdict is not
/// an error; this only covers unreadable allow/deny files.
#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("reading {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors installing or removing kernel watches.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("path {0:?} is already being watched")]
    AlreadyWatched(PathBuf),

    #[error("cannot stat {path:?}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("inotify_add_watch failed for {path:?}: {source}")]
    AddWatch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("walking {path:?}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("path {0:?} is not being watched")]
    NotWatched(PathBuf),
}

/// Reasons the executor refuses a new command before it starts.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("maximum concurrent commands ({0}) reached")]
    PoolFull(usize),

    #[error("self-trigger prevented: command already running for {path} as {principal}")]
    SelfTrigger { path: String, principal: String },

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("empty command after interpolation")]
    EmptyCommand,

    #[error("executor is shutting down")]
    ShuttingDown,
}

/// Failures of a command that was admitted and started.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("spawning {argv0}: {source}")]
    Spawn {
        argv0: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("waiting for child: {0}")]
    Wait(#[source] std::io::Error),

    #[error("killed during shutdown")]
    Killed,
}

pub use anyhow::{Error, Result};
