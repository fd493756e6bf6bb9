// src/watch/engine.rs

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::errors::RegistrationError;
use crate::table::Rule;
use crate::watch::inotify::{decode_events, InotifyFd, RawEvent};

/// How many decoded events may sit between the read loop and the consumer.
/// When the consumer falls behind, further events are dropped (with a
/// warning) rather than blocking the read loop, so the kernel queue cannot
/// overflow behind us.
pub const EVENT_CHANNEL_CAPACITY: usize = 512;

/// A decoded filesystem event, translated to the watched path it occurred
/// under.
#[derive(Debug, Clone)]
pub struct FsEvent {
    /// The directory (or file) the triggering watch was installed on.
    pub watch_dir: PathBuf,

    /// Name of the child the event refers to; empty for events on the
    /// watched path itself.
    pub name: String,

    /// `watch_dir` joined with `name` when a name is present.
    pub full_path: PathBuf,

    pub mask: u32,
    pub cookie: u32,
}

/// What the engine delivers to its consumer.
#[derive(Debug)]
pub enum EngineSignal {
    Event(FsEvent),
    /// The read loop hit a non-retryable I/O error and terminated.
    ReadError(String),
}

/// One registered kernel watch.
#[derive(Debug, Clone)]
struct WatchEntry {
    path: PathBuf,
    mask: u32,
    /// The rule this watch was installed for; `None` for subdirectories
    /// discovered by recursive expansion or autogrowth. Kept for
    /// diagnostics and cleanup attribution, never for matching.
    rule: Option<Arc<Rule>>,
    recursive: bool,
    dot_dirs: bool,
}

/// The two watch indices. Always updated together so that `by_wd` and
/// `by_path` describe the same set of active watches.
#[derive(Debug, Default)]
struct WatchMap {
    by_wd: HashMap<i32, WatchEntry>,
    by_path: HashMap<PathBuf, i32>,
}

impl WatchMap {
    fn insert(&mut self, wd: i32, entry: WatchEntry) {
        // Re-watching a path returns the same wd, so stale reverse entries
        // can only occur through that path; drop them to keep the indices
        // consistent.
        if let Some(old) = self.by_wd.insert(wd, entry.clone()) {
            self.by_path.remove(&old.path);
        }
        self.by_path.insert(entry.path, wd);
    }

    fn remove_wd(&mut self, wd: i32) -> Option<WatchEntry> {
        let entry = self.by_wd.remove(&wd)?;
        self.by_path.remove(&entry.path);
        Some(entry)
    }
}

struct Shared {
    fd: InotifyFd,
    map: RwLock<WatchMap>,
    running: AtomicBool,
}

/// The inotify watch engine.
///
/// Owns the inotify descriptor and both watch indices, expands recursive
/// rules over their subtrees, grows the watch set when directories appear
/// under a recursive watch, and decodes the kernel event stream onto a
/// bounded channel.
pub struct WatchEngine {
    shared: Arc<Shared>,
    reader: Option<thread::JoinHandle<()>>,
}

impl WatchEngine {
    pub fn new() -> Result<WatchEngine> {
        let fd = InotifyFd::new().context("initializing inotify instance")?;
        Ok(WatchEngine {
            shared: Arc::new(Shared {
                fd,
                map: RwLock::new(WatchMap::default()),
                running: AtomicBool::new(false),
            }),
            reader: None,
        })
    }

    /// Start the blocking read loop on its own thread. Decoded events are
    /// delivered on `tx`; the channel closes when the loop exits.
    pub fn start(&mut self, tx: mpsc::Sender<EngineSignal>) -> Result<()> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(anyhow!("watch engine is already running"));
        }
        let shared = Arc::clone(&self.shared);
        self.reader = Some(
            thread::Builder::new()
                .name("watchcron-inotify".to_string())
                .spawn(move || read_loop(shared, tx))
                .context("spawning inotify read thread")?,
        );
        info!("watch engine started");
        Ok(())
    }

    /// Register a rule's path with the kernel.
    ///
    /// For a recursive rule on a directory, every subdirectory is watched
    /// as well (skipping dot-directories unless the rule includes them).
    /// Failure to watch an individual subdirectory is logged and skipped;
    /// failure to *enumerate* the tree tears down everything this call
    /// installed, so registration is atomic for the caller.
    pub fn register(&self, rule: &Arc<Rule>) -> Result<(), RegistrationError> {
        let root = PathBuf::from(&rule.path);
        let mut map = self.shared.map.write();

        if map.by_path.contains_key(&root) {
            return Err(RegistrationError::AlreadyWatched(root));
        }

        let meta = fs::metadata(&root).map_err(|source| RegistrationError::Stat {
            path: root.clone(),
            source,
        })?;

        let root_wd =
            self.shared
                .fd
                .add_watch(&root, rule.mask)
                .map_err(|source| RegistrationError::AddWatch {
                    path: root.clone(),
                    source,
                })?;
        map.insert(
            root_wd,
            WatchEntry {
                path: root.clone(),
                mask: rule.mask,
                rule: Some(Arc::clone(rule)),
                recursive: rule.recursive,
                dot_dirs: rule.include_dot_dirs,
            },
        );

        if meta.is_dir() && rule.recursive {
            let mut installed = vec![root_wd];
            if let Err(err) = self.register_subtree(
                &mut map,
                &root,
                rule.mask,
                rule.include_dot_dirs,
                &mut installed,
            ) {
                for wd in installed {
                    if map.remove_wd(wd).is_some() {
                        let _ = self.shared.fd.rm_watch(wd);
                    }
                }
                return Err(err);
            }
        }

        debug!(path = %rule.path, mask = %format_args!("0x{:x}", rule.mask), "watch registered");
        Ok(())
    }

    fn register_subtree(
        &self,
        map: &mut WatchMap,
        dir: &Path,
        mask: u32,
        dot_dirs: bool,
        installed: &mut Vec<i32>,
    ) -> Result<(), RegistrationError> {
        let entries = fs::read_dir(dir).map_err(|source| RegistrationError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| RegistrationError::Walk {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();

            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            if !dot_dirs && basename_is_hidden(&path) {
                continue;
            }

            match self.shared.fd.add_watch(&path, mask) {
                Ok(wd) => {
                    map.insert(
                        wd,
                        WatchEntry {
                            path: path.clone(),
                            mask,
                            rule: None,
                            recursive: true,
                            dot_dirs,
                        },
                    );
                    installed.push(wd);
                }
                Err(err) => {
                    warn!(path = ?path, error = %err, "failed to watch subdirectory, skipping");
                    continue;
                }
            }

            self.register_subtree(map, &path, mask, dot_dirs, installed)?;
        }

        Ok(())
    }

    /// Remove the watch on `path`. Unknown paths are an error.
    pub fn unregister(&self, path: &Path) -> Result<(), RegistrationError> {
        let mut map = self.shared.map.write();
        let Some(&wd) = map.by_path.get(path) else {
            return Err(RegistrationError::NotWatched(path.to_path_buf()));
        };
        if let Some(entry) = map.remove_wd(wd) {
            debug!(path = ?path, rule_root = entry.rule.is_some(), "watch removed");
        }
        if let Err(err) = self.shared.fd.rm_watch(wd) {
            warn!(path = ?path, error = %err, "inotify_rm_watch failed");
        }
        Ok(())
    }

    /// Remove every registered watch, keeping the engine usable. Used by
    /// reload to rebuild the watch set from scratch.
    pub fn clear(&self) {
        let mut map = self.shared.map.write();
        for (&wd, _) in map.by_wd.iter() {
            let _ = self.shared.fd.rm_watch(wd);
        }
        map.by_wd.clear();
        map.by_path.clear();
    }

    /// All currently watched paths, in no particular order.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.shared.map.read().by_path.keys().cloned().collect()
    }

    pub fn watch_count(&self) -> usize {
        self.shared.map.read().by_wd.len()
    }

    /// Tear the engine down: remove all watches, close the descriptor, and
    /// join the read thread. After this no further events are delivered.
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.clear();
        self.shared.fd.close();
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        info!("watch engine stopped");
    }
}

impl Drop for WatchEngine {
    fn drop(&mut self) {
        if self.shared.running.load(Ordering::SeqCst) {
            self.stop();
        }
    }
}

fn basename_is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// The blocking read loop: read, decode, translate, deliver, autogrow.
fn read_loop(shared: Arc<Shared>, tx: mpsc::Sender<EngineSignal>) {
    let mut buf = [0u8; 4096];

    loop {
        if !shared.running.load(Ordering::SeqCst) {
            break;
        }

        let n = match shared.fd.read(&mut buf) {
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                // Teardown closes the descriptor under us; only a failure
                // while still running is worth reporting.
                if shared.running.load(Ordering::SeqCst) {
                    error!(error = %err, "inotify read failed");
                    let _ = tx.blocking_send(EngineSignal::ReadError(err.to_string()));
                }
                break;
            }
        };
        if n == 0 {
            continue;
        }

        for raw in decode_events(&buf[..n]) {
            if let Some(event) = translate(&shared, &raw) {
                match tx.try_send(EngineSignal::Event(event)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(signal)) => {
                        if let EngineSignal::Event(dropped) = signal {
                            warn!(
                                path = ?dropped.full_path,
                                mask = %format_args!("0x{:x}", dropped.mask),
                                "event channel full, dropping event"
                            );
                        }
                    }
                    Err(TrySendError::Closed(_)) => return,
                }
            }

            if raw.mask & libc::IN_CREATE != 0 && raw.mask & libc::IN_ISDIR != 0 {
                autogrow(&shared, &raw);
            }
        }
    }

    debug!("inotify read loop exited");
}

/// Resolve a raw record against the watch indices. Events for a wd we no
/// longer track (e.g. just unregistered) are dropped.
fn translate(shared: &Shared, raw: &RawEvent) -> Option<FsEvent> {
    let map = shared.map.read();
    let entry = map.by_wd.get(&raw.wd)?;

    let full_path = if raw.name.is_empty() {
        entry.path.clone()
    } else {
        entry.path.join(&raw.name)
    };

    Some(FsEvent {
        watch_dir: entry.path.clone(),
        name: raw.name.clone(),
        full_path,
        mask: raw.mask,
        cookie: raw.cookie,
    })
}

/// A directory appeared under a recursive watch: start watching it too,
/// inheriting the parent's mask and dot-dir policy. Failure is logged and
/// skipped.
fn autogrow(shared: &Shared, raw: &RawEvent) {
    if raw.name.is_empty() {
        return;
    }

    let mut map = shared.map.write();
    let Some(entry) = map.by_wd.get(&raw.wd) else {
        return;
    };
    if !entry.recursive {
        return;
    }
    if !entry.dot_dirs && raw.name.starts_with('.') {
        return;
    }

    let new_path = entry.path.join(&raw.name);
    let mask = entry.mask;
    let dot_dirs = entry.dot_dirs;

    match fs::metadata(&new_path) {
        Ok(meta) if meta.is_dir() => {}
        _ => return,
    }

    match shared.fd.add_watch(&new_path, mask) {
        Ok(wd) => {
            debug!(path = ?new_path, "watch added for new subdirectory");
            map.insert(
                wd,
                WatchEntry {
                    path: new_path,
                    mask,
                    rule: None,
                    recursive: true,
                    dot_dirs,
                },
            );
        }
        Err(err) => {
            warn!(path = ?new_path, error = %err, "failed to watch new subdirectory");
        }
    }
}
