//! Quote-aware splitting of composite shell command strings.
//!
//! A status-line command is a list of shell fragments joined by `;`, `&&`,
//! or the two-character literal `\n`. Separators inside single or double
//! quotes belong to the fragment that contains them, so a fragment like
//! `bash -lc 'a; b'` stays in one piece.

use std::ops::Range;

/// Where the scanner currently is with respect to shell quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    Unquoted,
    Single,
    Double,
}

/// A command split into segments and the separators between them.
///
/// Invariant: `segments.len() == separators.len() + 1`. Segment ranges keep
/// their surrounding whitespace; separator ranges cover only the operator.
#[derive(Debug)]
pub struct Split<'a> {
    source: &'a str,
    pub segments: Vec<Range<usize>>,
    pub separators: Vec<Range<usize>>,
}

impl<'a> Split<'a> {
    pub fn segment(&self, i: usize) -> &'a str {
        &self.source[self.segments[i].clone()]
    }

    pub fn separator(&self, i: usize) -> &'a str {
        &self.source[self.separators[i].clone()]
    }

    pub(crate) fn len(&self) -> usize {
        self.segments.len()
    }

    /// Index of the last segment holding anything but whitespace.
    pub fn last_non_blank(&self) -> Option<usize> {
        (0..self.len())
            .rev()
            .find(|&i| !self.segment(i).trim().is_empty())
    }
}

/// Length of the separator starting at `i`, if any. Only valid outside quotes.
fn separator_len(bytes: &[u8], i: usize) -> Option<usize> {
    match (bytes[i], bytes.get(i + 1)) {
        (b';', _) => Some(1),
        (b'&', Some(b'&')) => Some(2),
        (b'\\', Some(b'n')) => Some(2),
        _ => None,
    }
}

/// Split `command` on top-level separators.
///
/// Backslash escapes the next character outside single quotes, except that
/// `\n` outside any quotes is the literal-newline separator. Separators are
/// ASCII, so every split point falls on a char boundary.
pub fn split_command(command: &str) -> Split<'_> {
    let bytes = command.as_bytes();
    let mut segments = Vec::new();
    let mut separators = Vec::new();
    let mut state = QuoteState::Unquoted;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match state {
            QuoteState::Single => {
                if bytes[i] == b'\'' {
                    state = QuoteState::Unquoted;
                }
                i += 1;
            }
            QuoteState::Double => {
                match bytes[i] {
                    b'\\' => i += 1,
                    b'"' => state = QuoteState::Unquoted,
                    _ => {}
                }
                i += 1;
            }
            QuoteState::Unquoted => {
                if let Some(len) = separator_len(bytes, i) {
                    segments.push(start..i);
                    separators.push(i..i + len);
                    i += len;
                    start = i;
                    continue;
                }
                match bytes[i] {
                    b'\'' => state = QuoteState::Single,
                    b'"' => state = QuoteState::Double,
                    b'\\' => i += 1,
                    _ => {}
                }
                i += 1;
            }
        }
    }
    segments.push(start..command.len());

    Split {
        source: command,
        segments,
        separators,
    }
}

/// Escape `s` for use inside a double-quoted shell word.
pub fn escape_double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '\\' | '"' | '$' | '`') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
