// src/daemon/supervisor.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::DaemonSection;
use crate::dispatch::{Dispatcher, LoadedTables};
use crate::exec::Executor;
use crate::permissions::PermissionGate;
use crate::table::{load_system_tables, load_user_tables};
use crate::watch::{EngineSignal, WatchEngine, EVENT_CHANNEL_CAPACITY};

/// Daemon lifecycle owner.
///
/// Holds the watch engine, the executor, and the loaded tables, and drives
/// the single event/signal loop. Because reload and shutdown are both
/// handled inside that loop, they can never interleave.
pub struct Supervisor {
    config: DaemonSection,
    engine: WatchEngine,
    executor: Executor,
    tables: Arc<RwLock<LoadedTables>>,
    dispatcher: Dispatcher,
}

impl Supervisor {
    pub fn new(config: DaemonSection) -> Result<Supervisor> {
        let engine = WatchEngine::new()?;
        let executor = Executor::new(config.max_concurrent_commands, config.command_timeout());
        let tables = Arc::new(RwLock::new(LoadedTables::default()));
        let gate = PermissionGate::new(config.allow_file.clone(), config.deny_file.clone());
        let dispatcher = Dispatcher::new(Arc::clone(&tables), gate, executor.clone());

        Ok(Supervisor {
            config,
            engine,
            executor,
            tables,
            dispatcher,
        })
    }

    /// Run until a terminate-class signal (or a fatal engine error) arrives.
    pub async fn run(mut self) -> Result<()> {
        self.reload_tables();

        let (events_tx, mut events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.engine.start(events_tx)?;

        let mut sigterm =
            signal(SignalKind::terminate()).context("registering SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt()).context("registering SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("registering SIGHUP handler")?;

        info!(version = crate::VERSION, "watchcrond running");

        loop {
            tokio::select! {
                received = events_rx.recv() => match received {
                    Some(EngineSignal::Event(event)) => {
                        debug!(
                            path = ?event.full_path,
                            mask = %format_args!("0x{:x}", event.mask),
                            "event received"
                        );
                        self.dispatcher.dispatch(&event);
                    }
                    Some(EngineSignal::ReadError(err)) => {
                        error!(error = %err, "inotify read failed, shutting down");
                        break;
                    }
                    None => {
                        error!("engine event channel closed unexpectedly, shutting down");
                        break;
                    }
                },
                _ = sigterm.recv() => {
                    info!("SIGTERM received, shutting down");
                    break;
                }
                _ = sigint.recv() => {
                    info!("SIGINT received, shutting down");
                    break;
                }
                _ = sighup.recv() => {
                    info!("SIGHUP received, reloading tables");
                    self.reload_tables();
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Load all user and system tables, rebuild the watch set, and swap the
    /// in-memory tables.
    ///
    /// A table file that fails to parse is skipped; a rule whose path cannot
    /// be watched is skipped. In-flight commands are untouched: they hold
    /// their own references to the rules they were started from.
    pub fn reload_tables(&mut self) {
        let user = load_user_tables(&self.config.user_table_dir);
        let system = load_system_tables(&self.config.system_table_dir);

        self.engine.clear();

        let mut registered = 0usize;
        for table in user.iter().chain(system.iter()) {
            for rule in &table.rules {
                match self.engine.register(rule) {
                    Ok(()) => registered += 1,
                    Err(err) => {
                        warn!(
                            user = %table.principal,
                            table = ?table.source,
                            path = %rule.path,
                            line = rule.line,
                            error = %err,
                            "failed to register watch for rule"
                        );
                    }
                }
            }
        }

        info!(
            user_tables = user.len(),
            system_tables = system.len(),
            rules_watched = registered,
            watches = self.engine.watch_count(),
            "tables loaded"
        );

        *self.tables.write() = LoadedTables { user, system };
    }

    /// Currently watched paths (rule roots and recursive subdirectories).
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.engine.watched_paths()
    }

    async fn shutdown(&mut self) {
        self.engine.stop();
        self.executor.shutdown(self.config.drain_timeout()).await;
        info!("watchcrond stopped");
    }
}
