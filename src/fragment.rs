//! Fragment management for the shared status-line command.
//!
//! The host keeps a single `statusLine.command` string that several plugins
//! may append to. This module owns exactly one fragment of that string: it
//! builds the canonical fragment, recognises it (current or legacy form),
//! and inserts, refreshes or strips it without touching anyone else's text.
//!
//! Detection always requires the plugin name or the marker token. A bare
//! `bash -lc '...'` from another plugin never matches.

use crate::quote::{escape_double_quoted, split_command, Split};
use anyhow::{bail, Result};
use regex::{Match, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

pub const PLUGIN_NAME: &str = "agent-dispatcher";
/// Trailing comment that tags the current fragment format.
pub const MARKER: &str = "agent-dispatcher-statusline";
/// Status-line entry point relative to the plugin root.
pub const SCRIPT_PATH: &str = "scripts/statusline/statusline.js";
/// Read by the fragment when it runs, not when it is built.
pub const PLUGIN_ROOT_VAR: &str = "CLAUDE_PLUGIN_ROOT";
pub const SEPARATOR: &str = " ; ";

static RE_CURRENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"bash\s+-lc\s+'[^']*#\s*{}[^']*'",
        regex::escape(MARKER)
    ))
    .unwrap()
});
/// Older installs invoked the script through a path containing the plugin
/// name, with no marker comment.
static RE_LEGACY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"bash\s+-lc\s+'[^']*{}[^']*{}[^']*'",
        regex::escape(PLUGIN_NAME),
        regex::escape(SCRIPT_PATH)
    ))
    .unwrap()
});

/// Which form of this plugin's fragment a piece of text carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Current,
    Legacy,
}

fn find_current(text: &str) -> Option<Match<'_>> {
    RE_CURRENT.find(text)
}

fn find_legacy(text: &str) -> Option<Match<'_>> {
    RE_LEGACY
        .find_iter(text)
        .find(|m| !RE_CURRENT.is_match(m.as_str()))
}

fn classify(segment: &str) -> Option<FragmentKind> {
    if find_current(segment).is_some() {
        Some(FragmentKind::Current)
    } else if find_legacy(segment).is_some() {
        Some(FragmentKind::Legacy)
    } else {
        None
    }
}

/// Delete every current or legacy match from `text`, leaving the rest as is.
fn cut_fragments(text: &str) -> String {
    let without_current = RE_CURRENT.replace_all(text, "");
    RE_LEGACY.replace_all(&without_current, "").into_owned()
}

/// Cut this plugin's fragments out of one segment.
///
/// Whatever else the segment holds (an env prefix, a backgrounded command)
/// is kept, wrapped in the segment's original outer whitespace. Returns an
/// empty string when nothing but whitespace remains.
fn strip_segment(segment: &str) -> String {
    let cut = cut_fragments(segment);
    let core = cut.trim();
    if core.is_empty() {
        return String::new();
    }
    let lead = &segment[..segment.len() - segment.trim_start().len()];
    let trail = &segment[segment.trim_end().len()..];
    format!("{lead}{core}{trail}")
}

/// True if `command` holds a marker-bearing fragment.
pub fn detect_current(command: &str) -> bool {
    find_current(command).is_some()
}

/// True if `command` holds a pre-marker fragment of this plugin.
pub fn detect_legacy(command: &str) -> bool {
    find_legacy(command).is_some()
}

/// Build the canonical fragment invoking the status-line script with `runner`.
///
/// The result is a single-quoted `bash -lc` script, so `runner` may not
/// contain a single quote. Other shell specials are escaped for the
/// double-quoted word the runner lands in.
pub fn build_fragment(runner: &str) -> Result<String> {
    if runner.contains('\'') {
        bail!("runner path may not contain a single quote: {runner}");
    }
    let script = [
        format!("plugin_dir=\"${{{PLUGIN_ROOT_VAR}:-}}\""),
        "if [ -z \"$plugin_dir\" ]; then exit 0; fi".to_string(),
        format!(
            "\"{}\" \"${{plugin_dir}}{SCRIPT_PATH}\" # {MARKER}",
            escape_double_quoted(runner)
        ),
    ]
    .join("; ");
    Ok(format!("bash -lc '{script}'"))
}

/// Rejoin the kept segments of `split`.
///
/// Neighbours that were adjacent in the source keep their original separator
/// and whitespace. Wherever something was dropped in between, the gap becomes
/// one canonical separator.
fn rejoin(split: &Split<'_>, texts: &[Cow<'_, str>], keep: &[bool]) -> String {
    let mut out = String::new();
    let mut prev: Option<usize> = None;
    for (i, text) in texts.iter().enumerate() {
        if !keep[i] {
            continue;
        }
        match prev {
            None => out.push_str(text),
            Some(p) if p + 1 == i => {
                out.push_str(split.separator(p));
                out.push_str(text);
            }
            Some(_) => {
                out.truncate(out.trim_end().len());
                out.push_str(SEPARATOR);
                out.push_str(text.trim_start());
            }
        }
        prev = Some(i);
    }
    out.trim().to_string()
}

/// Remove every current or legacy fragment from `command`.
///
/// Only the fragment itself is cut; other text sharing its segment stays.
/// A segment left blank goes with its separator, leading and trailing
/// separators are dropped and runs of separators collapse into
/// [`SEPARATOR`]. Returns an empty string when nothing is left.
pub fn remove(command: &str) -> String {
    let split = split_command(command);
    let texts: Vec<Cow<'_, str>> = (0..split.len())
        .map(|i| {
            let segment = split.segment(i);
            match classify(segment) {
                Some(_) => Cow::Owned(strip_segment(segment)),
                None => Cow::Borrowed(segment),
            }
        })
        .collect();
    let keep: Vec<bool> = texts.iter().map(|t| !t.trim().is_empty()).collect();
    rejoin(&split, &texts, &keep)
}

/// Owns the fragment for one runner path.
#[derive(Debug, Clone)]
pub struct FragmentManager {
    fragment: String,
}

impl FragmentManager {
    pub fn new(runner: &str) -> Result<Self> {
        Ok(Self {
            fragment: build_fragment(runner)?,
        })
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Insert or refresh this plugin's fragment in `command`.
    ///
    /// An existing current fragment is replaced in place; failing that, a
    /// legacy one is migrated in place; otherwise the fragment is appended.
    /// Any extra copies of the fragment are dropped.
    pub fn upsert(&self, command: &str) -> String {
        let split = split_command(command);
        let kinds: Vec<Option<FragmentKind>> =
            (0..split.len()).map(|i| classify(split.segment(i))).collect();

        let target = kinds
            .iter()
            .position(|k| *k == Some(FragmentKind::Current))
            .or_else(|| kinds.iter().position(|k| *k == Some(FragmentKind::Legacy)));

        let Some(target) = target else {
            return self.append(command, &split);
        };

        let mut texts: Vec<Cow<'_, str>> = (0..split.len())
            .map(|i| match kinds[i] {
                Some(_) if i != target => Cow::Owned(strip_segment(split.segment(i))),
                _ => Cow::Borrowed(split.segment(i)),
            })
            .collect();
        texts[target] = Cow::Owned(self.replace_in(split.segment(target), kinds[target]));

        let duplicates = kinds
            .iter()
            .enumerate()
            .any(|(i, k)| i != target && k.is_some());
        if !duplicates {
            // Everything else is untouched, including whitespace at the ends.
            let mut out = String::with_capacity(command.len() + self.fragment.len());
            for (i, text) in texts.iter().enumerate() {
                if i > 0 {
                    out.push_str(split.separator(i - 1));
                }
                out.push_str(text);
            }
            return out;
        }

        let keep: Vec<bool> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| i == target || !t.trim().is_empty())
            .collect();
        rejoin(&split, &texts, &keep)
    }

    fn replace_in(&self, segment: &str, kind: Option<FragmentKind>) -> String {
        let found = match kind {
            Some(FragmentKind::Current) => find_current(segment),
            Some(FragmentKind::Legacy) => find_legacy(segment),
            None => None,
        };
        match found {
            Some(m) => format!(
                "{}{}{}",
                cut_fragments(&segment[..m.start()]),
                self.fragment,
                cut_fragments(&segment[m.end()..])
            ),
            None => segment.to_string(),
        }
    }

    fn append(&self, command: &str, split: &Split<'_>) -> String {
        match split.last_non_blank() {
            Some(last) => {
                let base = command[..split.segments[last].end].trim_end();
                format!("{base}{SEPARATOR}{}", self.fragment)
            }
            None => self.fragment.clone(),
        }
    }
}
