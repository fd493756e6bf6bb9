// src/watch/mod.rs

//! The inotify watch engine.
//!
//! This module is responsible for:
//! - Owning the single inotify descriptor and decoding its raw record
//!   stream ([`inotify`]).
//! - Maintaining the bidirectional watch-descriptor ↔ path indices,
//!   recursive expansion, and autogrowth ([`engine`]).
//!
//! It does **not** know about tables or commands; it only turns kernel
//! records into [`FsEvent`]s on a bounded channel.

pub mod engine;
pub mod inotify;

pub use engine::{EngineSignal, FsEvent, WatchEngine, EVENT_CHANNEL_CAPACITY};
