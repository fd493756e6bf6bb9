// src/table/rule.rs

use regex::Regex;

use crate::errors::ParseError;
use crate::table::mask;

/// One table rule: a watched path, an event mask, a command template, and
/// behaviour options. Immutable after parsing; shared via `Arc` between the
/// loaded tables, the watch engine, and running commands.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Absolute filesystem path. May contain `*`, which matches like the
    /// regex `.*` (see [`Rule::matches_path`]).
    pub path: String,

    /// inotify event mask (bitwise OR of `IN_*` values).
    pub mask: u32,

    /// Command template with `$@ $# $% $& $$` placeholders.
    pub command: String,

    /// When set (the default), at most one command for this rule's
    /// `(path, principal)` pair may run at a time.
    pub no_self_trigger: bool,

    /// Watch subdirectories of the path as well.
    pub recursive: bool,

    /// Include subdirectories whose basename starts with `.` in recursive
    /// expansion.
    pub include_dot_dirs: bool,

    /// 1-based line number in the source table file, for diagnostics.
    pub line: usize,

    /// Compiled pattern when `path` contains `*`; `None` otherwise, or when
    /// the derived pattern fails to compile (such a rule never matches by
    /// pattern).
    pattern: Option<Regex>,
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        // The compiled pattern is derived from `path` and carries no extra
        // identity.
        self.path == other.path
            && self.mask == other.mask
            && self.command == other.command
            && self.no_self_trigger == other.no_self_trigger
            && self.recursive == other.recursive
            && self.include_dot_dirs == other.include_dot_dirs
    }
}

impl Eq for Rule {}

impl Rule {
    /// Parse one logical table line.
    ///
    /// Returns `Ok(None)` for blank lines and `#` comments, `Ok(Some(rule))`
    /// for a valid rule line, and a [`ParseError`] citing `line_number`
    /// otherwise.
    pub fn parse_line(line: &str, line_number: usize) -> Result<Option<Rule>, ParseError> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }

        let Some((path, rest)) = split_field(trimmed) else {
            return Err(ParseError::BadFieldCount { line: line_number });
        };
        let Some((mask_field, command)) = split_field(rest) else {
            return Err(ParseError::BadFieldCount { line: line_number });
        };

        let mut no_self_trigger = true;
        let mut recursive = true;
        let mut include_dot_dirs = false;
        let mut bits: u32 = 0;

        for token in mask_field.split(',') {
            let token = token.trim();
            if let Some((key, value)) = token.split_once('=') {
                let key = key.trim();
                match key {
                    "loopable" => no_self_trigger = !parse_bool_option(key, value, line_number)?,
                    "recursive" => recursive = parse_bool_option(key, value, line_number)?,
                    "dotdirs" => include_dot_dirs = parse_bool_option(key, value, line_number)?,
                    other => {
                        return Err(ParseError::UnknownOption {
                            line: line_number,
                            key: other.to_string(),
                        })
                    }
                }
                continue;
            }

            if let Some(named) = mask::lookup(token) {
                bits |= named;
            } else {
                bits |= mask::parse_numeric(token, line_number)?;
            }
        }

        if bits == 0 {
            return Err(ParseError::EmptyMask { line: line_number });
        }
        if !path.starts_with('/') {
            return Err(ParseError::RelativePath {
                line: line_number,
                path: path.to_string(),
            });
        }
        if command.trim().is_empty() {
            return Err(ParseError::EmptyCommand { line: line_number });
        }

        Ok(Some(Rule::build(
            path,
            bits,
            command,
            no_self_trigger,
            recursive,
            include_dot_dirs,
            line_number,
        )))
    }

    fn build(
        path: &str,
        mask: u32,
        command: &str,
        no_self_trigger: bool,
        recursive: bool,
        include_dot_dirs: bool,
        line: usize,
    ) -> Rule {
        let pattern = if path.contains('*') {
            // `*` becomes `.*` and the whole path is anchored. Other regex
            // metacharacters in the path are NOT escaped, so a path with
            // `.` or `+` matches more broadly than a shell glob would.
            Regex::new(&format!("^{}$", path.replace('*', ".*"))).ok()
        } else {
            None
        };
        Rule {
            path: path.to_string(),
            mask,
            command: command.to_string(),
            no_self_trigger,
            recursive,
            include_dot_dirs,
            line,
            pattern,
        }
    }

    /// Whether this rule's path matches a candidate absolute path.
    ///
    /// With no `*` in the rule path this is literal equality; with `*` the
    /// candidate must fully match the derived anchored pattern.
    pub fn matches_path(&self, candidate: &str) -> bool {
        if self.path.contains('*') {
            self.pattern
                .as_ref()
                .is_some_and(|re| re.is_match(candidate))
        } else {
            self.path == candidate
        }
    }

    /// Serialize back to table-file form: `<path> <mask+options> <command>`.
    ///
    /// Options that still hold their default value are omitted, so
    /// `parse(render(rule))` reproduces the rule.
    pub fn render(&self) -> String {
        let mut mask_field = mask::render_mask(self.mask);

        let mut opts: Vec<&str> = Vec::new();
        if !self.no_self_trigger {
            opts.push("loopable=true");
        }
        if !self.recursive {
            opts.push("recursive=false");
        }
        if self.include_dot_dirs {
            opts.push("dotdirs=true");
        }
        if !opts.is_empty() {
            mask_field = format!("{},{}", mask_field, opts.join(","));
        }

        format!("{} {} {}", self.path, mask_field, self.command)
    }

    /// Expand the command template for one event, in a single pass.
    ///
    /// `$$` → `$`, `$@` → watch directory, `$#` → event filename, `$%` →
    /// comma-joined event names, `$&` → decimal event mask. The single pass
    /// guarantees a `$` produced by `$$` can never consume a following
    /// `@`/`#`/`%`/`&`.
    pub fn interpolate(&self, watch_dir: &str, name: &str, event_mask: u32) -> String {
        let mut out = String::with_capacity(self.command.len() + 16);
        let mut chars = self.command.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                out.push(c);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    out.push('$');
                }
                Some('@') => {
                    chars.next();
                    out.push_str(watch_dir);
                }
                Some('#') => {
                    chars.next();
                    out.push_str(name);
                }
                Some('%') => {
                    chars.next();
                    out.push_str(&mask::mask_names(event_mask));
                }
                Some('&') => {
                    chars.next();
                    out.push_str(&event_mask.to_string());
                }
                _ => out.push('$'),
            }
        }

        out
    }
}

/// Split off the first whitespace-separated field, treating a run of
/// whitespace as one separator. Returns `None` when there is no non-empty
/// remainder.
fn split_field(s: &str) -> Option<(&str, &str)> {
    let mut parts = s.splitn(2, char::is_whitespace);
    let head = parts.next()?;
    let rest = parts.next()?.trim_start();
    if rest.is_empty() {
        return None;
    }
    Some((head, rest))
}

fn parse_bool_option(key: &str, value: &str, line: usize) -> Result<bool, ParseError> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ParseError::BadOptionValue {
            line,
            key: key.to_string(),
            value: other.to_string(),
        }),
    }
}
