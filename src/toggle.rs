//! Enable/disable policy over the `statusLine` field.
//!
//! States: absent, command with our fragment, command without it, text.
//! Enable moves any state to "command with fragment". Disable only acts on a
//! command that carries the fragment; everything else is a no-op.

use crate::fragment::{self, FragmentManager, PLUGIN_NAME, SEPARATOR};
use crate::quote::escape_double_quoted;
use crate::settings::{SettingsFile, StatusLine};
use log::debug;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Enable,
    Disable,
    /// Selected by `--status`, never by the positional word.
    Status,
}

impl Action {
    /// Positional action word. Case-insensitive; anything but `disable` enables.
    pub fn parse_lenient(s: &str) -> Self {
        if s.eq_ignore_ascii_case("disable") {
            Action::Disable
        } else {
            Action::Enable
        }
    }
}

/// Where the `statusLine` field stands with respect to this plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Absent,
    Enabled,
    EnabledLegacy,
    CommandWithoutFragment,
    Text,
}

impl State {
    pub fn of(status_line: &StatusLine) -> Self {
        match status_line {
            StatusLine::Absent => State::Absent,
            StatusLine::Text(_) => State::Text,
            StatusLine::Command(cmd) if fragment::detect_current(cmd) => State::Enabled,
            StatusLine::Command(cmd) if fragment::detect_legacy(cmd) => State::EnabledLegacy,
            StatusLine::Command(_) => State::CommandWithoutFragment,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Absent => write!(f, "not configured"),
            State::Enabled => write!(f, "enabled"),
            State::EnabledLegacy => write!(f, "enabled (legacy format)"),
            State::CommandWithoutFragment => write!(f, "not enabled"),
            State::Text => write!(f, "text entry"),
        }
    }
}

/// Result of one action, printed as the single output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Enabled,
    Disabled,
    /// Command entry exists but holds none of our fragments.
    NotEnabled,
    /// No command entry at all.
    NoStatusLine,
    Status(State),
}

impl Outcome {
    /// Whether the settings file must be written back.
    pub fn persists(&self) -> bool {
        matches!(self, Outcome::Enabled | Outcome::Disabled)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Enabled => {
                write!(f, "Statusline for {PLUGIN_NAME} enabled for this project.")
            }
            Outcome::Disabled => {
                write!(f, "Statusline for {PLUGIN_NAME} disabled for this project.")
            }
            Outcome::NotEnabled => write!(f, "Statusline for {PLUGIN_NAME} was not enabled."),
            Outcome::NoStatusLine => write!(f, "Statusline was not enabled."),
            Outcome::Status(state) => write!(f, "Statusline for {PLUGIN_NAME}: {state}"),
        }
    }
}

/// Put this plugin's fragment into the status line.
pub fn enable(settings: &mut SettingsFile, manager: &FragmentManager) -> Outcome {
    let command = match settings.status_line() {
        StatusLine::Absent => manager.fragment().to_string(),
        StatusLine::Command(current) => manager.upsert(&current),
        StatusLine::Text(text) if text.is_empty() => manager.fragment().to_string(),
        StatusLine::Text(text) => format!(
            "echo \"{}\"{SEPARATOR}{}",
            escape_double_quoted(&text),
            manager.fragment()
        ),
    };
    settings.set_command(command);
    Outcome::Enabled
}

/// Strip this plugin's fragment from the status line, deleting the entry
/// when nothing else is left.
pub fn disable(settings: &mut SettingsFile) -> Outcome {
    let status_line = settings.status_line();
    let state = State::of(&status_line);
    debug!("status line state before disable: {state:?}");

    let StatusLine::Command(current) = status_line else {
        return Outcome::NoStatusLine;
    };
    if !matches!(state, State::Enabled | State::EnabledLegacy) {
        return Outcome::NotEnabled;
    }

    let remaining = fragment::remove(&current);
    if remaining.is_empty() {
        settings.remove_status_line();
    } else {
        settings.set_command(remaining);
    }
    Outcome::Disabled
}

pub fn status(settings: &SettingsFile) -> Outcome {
    Outcome::Status(State::of(&settings.status_line()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::STATUS_LINE_KEY;
    use serde_json::json;

    const OTHER: &str = "bash -lc 'other-plugin-fragment'";
    const LEGACY: &str = "bash -lc 'node /plugins/agent-dispatcher/scripts/statusline/statusline.js'";

    fn manager() -> FragmentManager {
        FragmentManager::new("/usr/bin/node").unwrap()
    }

    fn command_of(settings: &SettingsFile) -> String {
        match settings.status_line() {
            StatusLine::Command(c) => c,
            other => panic!("expected command entry, got {other:?}"),
        }
    }

    #[test]
    fn parses_actions_leniently() {
        assert_eq!(Action::parse_lenient("enable"), Action::Enable);
        assert_eq!(Action::parse_lenient("DISABLE"), Action::Disable);
        assert_eq!(Action::parse_lenient("status"), Action::Enable);
        assert_eq!(Action::parse_lenient("bogus"), Action::Enable);
        assert_eq!(Action::parse_lenient(""), Action::Enable);
    }

    #[test]
    fn enable_from_absent() {
        let mut s = SettingsFile::from_value(json!({}));
        assert_eq!(enable(&mut s, &manager()), Outcome::Enabled);
        assert_eq!(
            s.get(STATUS_LINE_KEY),
            Some(&json!({ "type": "command", "command": manager().fragment() }))
        );
    }

    #[test]
    fn enable_twice_is_idempotent() {
        let mut s = SettingsFile::from_value(json!({
            "statusLine": { "type": "command", "command": OTHER }
        }));
        enable(&mut s, &manager());
        let once = command_of(&s);
        enable(&mut s, &manager());
        assert_eq!(command_of(&s), once);
    }

    #[test]
    fn enable_converts_text_entry() {
        let mut s = SettingsFile::from_value(json!({
            "statusLine": { "type": "text", "value": "hi" }
        }));
        enable(&mut s, &manager());
        assert_eq!(
            s.get(STATUS_LINE_KEY),
            Some(&json!({
                "type": "command",
                "command": format!("echo \"hi\" ; {}", manager().fragment())
            }))
        );
    }

    #[test]
    fn enable_converts_empty_text_entry() {
        let mut s = SettingsFile::from_value(json!({
            "statusLine": { "type": "text", "value": "" }
        }));
        enable(&mut s, &manager());
        assert_eq!(command_of(&s), manager().fragment());
    }

    #[test]
    fn enable_migrates_legacy_without_duplicate() {
        let mut s = SettingsFile::from_value(json!({
            "statusLine": { "type": "command", "command": LEGACY }
        }));
        enable(&mut s, &manager());
        assert_eq!(command_of(&s), manager().fragment());
    }

    #[test]
    fn disable_round_trips_from_absent() {
        let mut s = SettingsFile::from_value(json!({ "model": "m" }));
        enable(&mut s, &manager());
        assert_eq!(disable(&mut s), Outcome::Disabled);
        assert_eq!(s.get(STATUS_LINE_KEY), None);
        assert_eq!(s.render().unwrap(), "{\n  \"model\": \"m\"\n}\n");
    }

    #[test]
    fn disable_leaves_other_plugin_intact() {
        let command = format!("{OTHER} ; {}", manager().fragment());
        let mut s = SettingsFile::from_value(json!({
            "statusLine": { "type": "command", "command": command, "padding": 0 }
        }));
        assert_eq!(disable(&mut s), Outcome::Disabled);
        assert_eq!(
            s.get(STATUS_LINE_KEY),
            Some(&json!({ "type": "command", "command": OTHER, "padding": 0 }))
        );
    }

    #[test]
    fn disable_removes_legacy() {
        let mut s = SettingsFile::from_value(json!({
            "statusLine": { "type": "command", "command": LEGACY }
        }));
        assert_eq!(disable(&mut s), Outcome::Disabled);
        assert_eq!(s.status_line(), StatusLine::Absent);
    }

    #[test]
    fn disable_noops() {
        let mut absent = SettingsFile::from_value(json!({}));
        assert_eq!(disable(&mut absent), Outcome::NoStatusLine);

        let mut text = SettingsFile::from_value(json!({
            "statusLine": { "type": "text", "value": "hi" }
        }));
        assert_eq!(disable(&mut text), Outcome::NoStatusLine);
        assert_eq!(text.status_line(), StatusLine::Text("hi".into()));

        let mut other = SettingsFile::from_value(json!({
            "statusLine": { "type": "command", "command": OTHER }
        }));
        assert_eq!(disable(&mut other), Outcome::NotEnabled);
        assert_eq!(command_of(&other), OTHER);
        assert!(!Outcome::NotEnabled.persists());
    }

    #[test]
    fn status_reports_each_state() {
        let cases = [
            (json!({}), State::Absent),
            (json!({ "statusLine": { "type": "text", "value": "x" } }), State::Text),
            (
                json!({ "statusLine": { "type": "command", "command": OTHER } }),
                State::CommandWithoutFragment,
            ),
            (
                json!({ "statusLine": { "type": "command", "command": LEGACY } }),
                State::EnabledLegacy,
            ),
            (
                json!({ "statusLine": { "type": "command", "command": manager().fragment() } }),
                State::Enabled,
            ),
        ];
        for (doc, expected) in cases {
            let s = SettingsFile::from_value(doc);
            assert_eq!(status(&s), Outcome::Status(expected));
        }
    }

    #[test]
    fn messages() {
        assert_eq!(
            Outcome::Enabled.to_string(),
            "Statusline for agent-dispatcher enabled for this project."
        );
        assert_eq!(
            Outcome::Disabled.to_string(),
            "Statusline for agent-dispatcher disabled for this project."
        );
        assert_eq!(
            Outcome::NotEnabled.to_string(),
            "Statusline for agent-dispatcher was not enabled."
        );
        assert_eq!(Outcome::NoStatusLine.to_string(), "Statusline was not enabled.");
        assert_eq!(
            Outcome::Status(State::EnabledLegacy).to_string(),
            "Statusline for agent-dispatcher: enabled (legacy format)"
        );
    }
}
