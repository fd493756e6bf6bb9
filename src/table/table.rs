// src/table/table.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use crate::table::rule::Rule;

/// An ordered sequence of rules belonging to one principal.
///
/// User tables take their principal from the table file's name; system
/// tables always run as `root`.
#[derive(Debug, Clone)]
pub struct Table {
    /// OS user the table's commands run as.
    pub principal: String,

    /// Source file the table was parsed from.
    pub source: PathBuf,

    /// Parsed rules, in file order. Duplicates are allowed and dispatch
    /// independently.
    pub rules: Vec<Arc<Rule>>,
}

impl Table {
    /// Parse a table file. The first bad line aborts the whole table with an
    /// error citing the file and line number.
    pub fn load(path: impl AsRef<Path>, principal: impl Into<String>) -> Result<Table> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading table file {:?}", path))?;

        let mut rules = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            let parsed = Rule::parse_line(line, idx + 1)
                .with_context(|| format!("in table file {:?}", path))?;
            if let Some(rule) = parsed {
                rules.push(Arc::new(rule));
            }
        }

        Ok(Table {
            principal: principal.into(),
            source: path.to_path_buf(),
            rules,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Render the table back to file form, with a short header comment.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# watchcron table for {}\n", self.principal));
        out.push_str("# Format: <path> <mask> <command>\n\n");
        for rule in &self.rules {
            out.push_str(&rule.render());
            out.push('\n');
        }
        out
    }
}

/// Load every user table under `dir`. The file name is the owning username.
///
/// A missing directory yields no tables; an unreadable or unparsable table
/// file is logged and skipped so one bad table cannot block the rest.
pub fn load_user_tables(dir: &Path) -> Vec<Table> {
    load_dir(dir, |file_name| file_name.to_string())
}

/// Load every system table under `dir`. System tables run as `root`.
pub fn load_system_tables(dir: &Path) -> Vec<Table> {
    load_dir(dir, |_| "root".to_string())
}

fn load_dir(dir: &Path, principal_for: impl Fn(&str) -> String) -> Vec<Table> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!(dir = ?dir, error = %err, "failed to read table directory");
            return Vec::new();
        }
    };

    let mut tables = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(dir = ?dir, error = %err, "failed to read directory entry");
                continue;
            }
        };
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();

        match Table::load(&path, principal_for(&file_name)) {
            Ok(table) => tables.push(table),
            Err(err) => {
                warn!(table = %file_name, error = %err, "failed to load table, skipping");
            }
        }
    }
    tables
}
