// src/table/mod.rs

//! Table model: rules, mask names, parsing, rendering, and loading.
//!
//! A table file is UTF-8 text, one rule per line:
//!
//! ```text
//! /var/log IN_CREATE,IN_MODIFY /usr/local/bin/index-log $@/$#
//! /srv/drop IN_CLOSE_WRITE,recursive=false,loopable=true /usr/bin/ingest $#
//! ```
//!
//! This module knows nothing about the kernel watch state or execution; it
//! only turns text into validated [`Rule`]s and back.

pub mod mask;
pub mod rule;
pub mod table;

pub use rule::Rule;
pub use table::{load_system_tables, load_user_tables, Table};
