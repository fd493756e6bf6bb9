// src/exec/executor.rs

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::unistd::User;
use parking_lot::Mutex;
use tokio::process::Command;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::errors::{AdmissionError, ExecutionError};
use crate::permissions;
use crate::table::{mask, Rule};
use crate::watch::FsEvent;

/// Outcome of one command, produced exactly once per admitted command and
/// consumed by the result log line.
#[derive(Debug, Clone)]
struct ExecutionResult {
    id: u64,
    success: bool,
    exit_code: Option<i32>,
    duration: Duration,
    error: Option<String>,
}

/// Executor-side record of a command in flight.
struct RunningCommand {
    rule: Arc<Rule>,
    principal: String,
    /// Full path of the event that triggered the command.
    trigger: std::path::PathBuf,
    started: Instant,
    /// Signalled to kill the child (shutdown past the drain deadline).
    kill: Arc<Notify>,
}

struct Inner {
    running: Mutex<HashMap<u64, RunningCommand>>,
    /// Signalled whenever the running set becomes empty.
    idle: Notify,
    accepting: AtomicBool,
    next_id: AtomicU64,
    max_concurrent: usize,
    timeout: Duration,
}

/// Bounded command executor.
///
/// Admission (capacity check, self-trigger interlock, record insertion) is
/// one critical section; execution itself runs on a spawned task per
/// command, so many commands proceed concurrently up to the cap.
#[derive(Clone)]
pub struct Executor {
    inner: Arc<Inner>,
}

impl Executor {
    pub fn new(max_concurrent: usize, timeout: Duration) -> Executor {
        Executor {
            inner: Arc::new(Inner {
                running: Mutex::new(HashMap::new()),
                idle: Notify::new(),
                accepting: AtomicBool::new(true),
                next_id: AtomicU64::new(1),
                max_concurrent,
                timeout,
            }),
        }
    }

    /// Admit and start one command for `rule` triggered by `event`, running
    /// as `principal`. Returns the command id on admission; the command
    /// itself completes asynchronously and its result is logged.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(
        &self,
        rule: Arc<Rule>,
        event: FsEvent,
        principal: &str,
    ) -> Result<u64, AdmissionError> {
        if !self.inner.accepting.load(Ordering::SeqCst) {
            return Err(AdmissionError::ShuttingDown);
        }

        // Credential lookup happens before the admission lock; it touches
        // the OS user database.
        let creds = if principal != "root" {
            match permissions::lookup_user(principal) {
                Some(user) => Some(user),
                None => return Err(AdmissionError::UnknownUser(principal.to_string())),
            }
        } else {
            None
        };

        let command_line = rule.interpolate(
            &event.watch_dir.to_string_lossy(),
            &event.name,
            event.mask,
        );
        let argv: Vec<String> = command_line
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if argv.is_empty() {
            return Err(AdmissionError::EmptyCommand);
        }

        let kill = Arc::new(Notify::new());
        let id = {
            let mut running = self.inner.running.lock();

            if running.len() >= self.inner.max_concurrent {
                return Err(AdmissionError::PoolFull(self.inner.max_concurrent));
            }
            if rule.no_self_trigger
                && running
                    .values()
                    .any(|cmd| cmd.rule.path == rule.path && cmd.principal == principal)
            {
                return Err(AdmissionError::SelfTrigger {
                    path: rule.path.clone(),
                    principal: principal.to_string(),
                });
            }

            let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
            running.insert(
                id,
                RunningCommand {
                    rule: Arc::clone(&rule),
                    principal: principal.to_string(),
                    trigger: event.full_path.clone(),
                    started: Instant::now(),
                    kill: Arc::clone(&kill),
                },
            );
            id
        };

        debug!(id, user = %principal, cmd = %command_line, "command admitted");

        let inner = Arc::clone(&self.inner);
        let principal = principal.to_string();
        tokio::spawn(async move {
            let result = run_command(id, &argv, &event, creds, inner.timeout, kill).await;
            finish(&inner, &rule, &principal, result);
        });

        Ok(id)
    }

    pub fn running_count(&self) -> usize {
        self.inner.running.lock().len()
    }

    /// Wait until no commands are in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.running.lock().is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Stop admitting, wait up to `drain` for in-flight commands to exit
    /// naturally, then kill any survivors.
    pub async fn shutdown(&self, drain: Duration) {
        self.inner.accepting.store(false, Ordering::SeqCst);

        if tokio::time::timeout(drain, self.wait_idle()).await.is_ok() {
            info!("executor drained");
            return;
        }

        warn!(
            survivors = self.running_count(),
            "drain deadline elapsed, killing remaining commands"
        );
        self.kill_all();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.wait_idle()).await;
    }

    /// Signal every in-flight command to be killed.
    pub fn kill_all(&self) {
        for (&id, cmd) in self.inner.running.lock().iter() {
            warn!(
                id,
                user = %cmd.principal,
                path = %cmd.rule.path,
                trigger = ?cmd.trigger,
                age_ms = cmd.started.elapsed().as_millis() as u64,
                "killing command"
            );
            cmd.kill.notify_one();
        }
    }
}

/// Run the child to completion under the timeout guard.
async fn run_command(
    id: u64,
    argv: &[String],
    event: &FsEvent,
    creds: Option<User>,
    timeout: Duration,
    kill: Arc<Notify>,
) -> ExecutionResult {
    let started = Instant::now();

    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..])
        .env("INCRON_PATH", &event.full_path)
        .env("INCRON_NAME", &event.name)
        .env("INCRON_EVENT", mask::mask_names(event.mask))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(user) = &creds {
        cmd.uid(user.uid.as_raw())
            .gid(user.gid.as_raw())
            .current_dir(&user.dir)
            .env("USER", &user.name)
            .env("HOME", &user.dir);
    }

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            return failed(
                id,
                started,
                ExecutionError::Spawn {
                    argv0: argv[0].clone(),
                    source: err,
                },
            )
        }
    };

    // Dropping the wait future (timeout or kill) drops the child, and
    // `kill_on_drop` takes it down; tokio reaps the orphan in the
    // background.
    tokio::select! {
        waited = tokio::time::timeout(timeout, child.wait_with_output()) => match waited {
            Ok(Ok(output)) => {
                if !output.stdout.is_empty() {
                    debug!(id, "stdout: {}", String::from_utf8_lossy(&output.stdout).trim_end());
                }
                if !output.stderr.is_empty() {
                    debug!(id, "stderr: {}", String::from_utf8_lossy(&output.stderr).trim_end());
                }
                ExecutionResult {
                    id,
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    duration: started.elapsed(),
                    error: None,
                }
            }
            Ok(Err(err)) => failed(id, started, ExecutionError::Wait(err)),
            Err(_) => failed(id, started, ExecutionError::Timeout(timeout)),
        },
        _ = kill.notified() => failed(id, started, ExecutionError::Killed),
    }
}

fn failed(id: u64, started: Instant, err: ExecutionError) -> ExecutionResult {
    ExecutionResult {
        id,
        success: false,
        exit_code: None,
        duration: started.elapsed(),
        error: Some(err.to_string()),
    }
}

/// Remove the running record and emit the result. Removal and emission are
/// one step, so a follow-up event for the same `(path, principal)` pair can
/// re-fire as soon as the result is out.
fn finish(inner: &Inner, rule: &Rule, principal: &str, result: ExecutionResult) {
    {
        let mut running = inner.running.lock();
        running.remove(&result.id);
        if running.is_empty() {
            inner.idle.notify_waiters();
        }
    }

    if result.success {
        info!(
            id = result.id,
            user = %principal,
            path = %rule.path,
            duration_ms = result.duration.as_millis() as u64,
            "command completed"
        );
    } else {
        warn!(
            id = result.id,
            user = %principal,
            path = %rule.path,
            exit_code = result.exit_code,
            duration_ms = result.duration.as_millis() as u64,
            error = result.error.as_deref().unwrap_or("non-zero exit"),
            "command failed"
        );
    }
}
