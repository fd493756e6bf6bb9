// src/table/mask.rs

//! Event-mask names, parsing, and rendering.
//!
//! The symbolic names are the kernel inotify flags; the bit values come from
//! `libc` so they always match the kernel ABI. Two aliases exist on top of
//! the kernel set: `IN_MOVE` and `IN_CLOSE`.

use crate::errors::ParseError;

/// Alias: `IN_MOVED_FROM | IN_MOVED_TO`.
pub const IN_MOVE: u32 = libc::IN_MOVED_FROM | libc::IN_MOVED_TO;

/// Alias: `IN_CLOSE_WRITE | IN_CLOSE_NOWRITE`.
pub const IN_CLOSE: u32 = libc::IN_CLOSE_WRITE | libc::IN_CLOSE_NOWRITE;

/// Named single flags in canonical rendering order.
///
/// The aliases and `IN_ALL_EVENTS` are handled separately: they are accepted
/// when parsing but never appear in rendered output (except the exact
/// `IN_ALL_EVENTS` collapse in [`render_mask`]).
const NAMED_FLAGS: &[(u32, &str)] = &[
    (libc::IN_ACCESS, "IN_ACCESS"),
    (libc::IN_MODIFY, "IN_MODIFY"),
    (libc::IN_ATTRIB, "IN_ATTRIB"),
    (libc::IN_CLOSE_WRITE, "IN_CLOSE_WRITE"),
    (libc::IN_CLOSE_NOWRITE, "IN_CLOSE_NOWRITE"),
    (libc::IN_OPEN, "IN_OPEN"),
    (libc::IN_MOVED_FROM, "IN_MOVED_FROM"),
    (libc::IN_MOVED_TO, "IN_MOVED_TO"),
    (libc::IN_CREATE, "IN_CREATE"),
    (libc::IN_DELETE, "IN_DELETE"),
    (libc::IN_DELETE_SELF, "IN_DELETE_SELF"),
    (libc::IN_MOVE_SELF, "IN_MOVE_SELF"),
    (libc::IN_UNMOUNT, "IN_UNMOUNT"),
    (libc::IN_Q_OVERFLOW, "IN_Q_OVERFLOW"),
    (libc::IN_IGNORED, "IN_IGNORED"),
    (libc::IN_ONLYDIR, "IN_ONLYDIR"),
    (libc::IN_DONT_FOLLOW, "IN_DONT_FOLLOW"),
    (libc::IN_EXCL_UNLINK, "IN_EXCL_UNLINK"),
    (libc::IN_MASK_ADD, "IN_MASK_ADD"),
    (libc::IN_ISDIR, "IN_ISDIR"),
    (libc::IN_ONESHOT, "IN_ONESHOT"),
];

/// Look up a symbolic event name (including aliases and `IN_ALL_EVENTS`).
pub fn lookup(name: &str) -> Option<u32> {
    match name {
        "IN_ALL_EVENTS" => Some(libc::IN_ALL_EVENTS),
        "IN_MOVE" => Some(IN_MOVE),
        "IN_CLOSE" => Some(IN_CLOSE),
        _ => NAMED_FLAGS
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(bits, _)| *bits),
    }
}

/// Parse a numeric mask literal: decimal, or hex with a `0x`/`0X` prefix.
pub fn parse_numeric(token: &str, line: usize) -> Result<u32, ParseError> {
    let parsed = if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        token.parse::<u32>()
    };
    parsed.map_err(|_| ParseError::UnknownMask {
        line,
        token: token.to_string(),
    })
}

/// Render a mask for table output.
///
/// A mask exactly equal to `IN_ALL_EVENTS` collapses to that single token;
/// otherwise the set named bits are listed in canonical order, with any
/// residual unnamed bits appended as one `0x<hex>` token.
pub fn render_mask(mask: u32) -> String {
    if mask == libc::IN_ALL_EVENTS {
        return "IN_ALL_EVENTS".to_string();
    }

    let mut parts = Vec::new();
    let mut rest = mask;
    for (bits, name) in NAMED_FLAGS {
        if rest & bits != 0 {
            parts.push((*name).to_string());
            rest &= !bits;
        }
    }
    if rest != 0 {
        parts.push(format!("0x{rest:x}"));
    }
    if parts.is_empty() {
        return "0".to_string();
    }
    parts.join(",")
}

/// Human-readable event names for logs and the `$%` expansion.
///
/// Unlike [`render_mask`], unnamed residual bits are ignored as long as at
/// least one named bit is set; a mask with no named bits renders as
/// `0x<hex>`.
pub fn mask_names(mask: u32) -> String {
    let parts: Vec<&str> = NAMED_FLAGS
        .iter()
        .filter(|(bits, _)| mask & bits != 0)
        .map(|(_, name)| *name)
        .collect();
    if parts.is_empty() {
        return format!("0x{mask:x}");
    }
    parts.join(",")
}
