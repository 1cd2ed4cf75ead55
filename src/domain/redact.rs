//! Hidden diagnostic text.
//!
//! Collaborators that build error messages wrap internal detail (OS error
//! strings, resolver output, addresses of intermediate hops) between
//! [`HIDDEN_OPEN`] and [`HIDDEN_CLOSE`]. Logs call [`reveal`] and keep
//! everything; anything sent to a client goes through [`Sanitized`], which
//! drops the marked segments.

use std::borrow::Cow;
use std::fmt;

pub const HIDDEN_OPEN: char = '\u{2062}';
pub const HIDDEN_CLOSE: char = '\u{2063}';

pub fn hide(detail: impl fmt::Display) -> String {
    format!("{}{}{}", HIDDEN_OPEN, detail, HIDDEN_CLOSE)
}

/// Removes every hidden segment. An unterminated segment runs to the end of the text.
pub fn clean(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;

    for ch in text.chars() {
        match ch {
            HIDDEN_OPEN => depth += 1,
            HIDDEN_CLOSE => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }

    out.trim().to_string()
}

/// Strips the markers but keeps the hidden text.
pub fn reveal(text: &str) -> Cow<'_, str> {
    let is_marker = |ch: char| ch == HIDDEN_OPEN || ch == HIDDEN_CLOSE;
    if text.contains(is_marker) {
        Cow::Owned(text.chars().filter(|ch| !is_marker(*ch)).collect())
    } else {
        Cow::Borrowed(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized(String);

impl Sanitized {
    pub fn new(text: &str) -> Self {
        Sanitized(clean(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0.into_bytes()
    }
}

impl fmt::Display for Sanitized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
