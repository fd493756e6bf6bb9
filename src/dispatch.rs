// src/dispatch.rs

//! Event dispatch: fan each filesystem event out to every matching rule.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::exec::Executor;
use crate::permissions::PermissionGate;
use crate::table::{Rule, Table};
use crate::watch::FsEvent;

/// The tables currently in effect, swapped wholesale on reload.
#[derive(Debug, Default)]
pub struct LoadedTables {
    pub user: Vec<Table>,
    pub system: Vec<Table>,
}

/// Matches events against the loaded tables and hands matches to the
/// executor.
///
/// Matching is stateless: every event scans every rule of every table, and
/// each match is scheduled independently. The permission gate is consulted
/// per user-table match at dispatch time, so revoking a user takes effect
/// without waiting for that user's commands to finish.
pub struct Dispatcher {
    tables: Arc<RwLock<LoadedTables>>,
    gate: PermissionGate,
    executor: Executor,
}

impl Dispatcher {
    pub fn new(
        tables: Arc<RwLock<LoadedTables>>,
        gate: PermissionGate,
        executor: Executor,
    ) -> Dispatcher {
        Dispatcher {
            tables,
            gate,
            executor,
        }
    }

    /// Fan `event` out to every matching rule.
    pub fn dispatch(&self, event: &FsEvent) {
        let tables = self.tables.read();

        for table in &tables.user {
            for rule in &table.rules {
                if !rule_matches(rule, event) {
                    continue;
                }
                match self.gate.permitted(&table.principal) {
                    Ok(true) => {}
                    Ok(false) => {
                        info!(user = %table.principal, path = %rule.path, "user not permitted, skipping match");
                        continue;
                    }
                    Err(err) => {
                        error!(user = %table.principal, error = %err, "permission check failed, skipping match");
                        continue;
                    }
                }
                self.submit(rule, event, &table.principal);
            }
        }

        for table in &tables.system {
            for rule in &table.rules {
                if rule_matches(rule, event) {
                    self.submit(rule, event, "root");
                }
            }
        }
    }

    fn submit(&self, rule: &Arc<Rule>, event: &FsEvent, principal: &str) {
        match self
            .executor
            .submit(Arc::clone(rule), event.clone(), principal)
        {
            Ok(id) => {
                debug!(id, user = %principal, path = %rule.path, "match scheduled");
            }
            Err(err) => {
                warn!(user = %principal, path = %rule.path, error = %err, "execution refused");
            }
        }
    }
}

/// A rule matches an event when its path matches either the watch directory
/// or the event's full path, and the masks intersect.
pub fn rule_matches(rule: &Rule, event: &FsEvent) -> bool {
    if rule.mask & event.mask == 0 {
        return false;
    }
    rule.matches_path(&event.watch_dir.to_string_lossy())
        || rule.matches_path(&event.full_path.to_string_lossy())
}
