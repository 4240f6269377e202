//! Project settings file: tolerant load, `statusLine` view, atomic save.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde_json::{json, Map, Value};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const STATUS_LINE_KEY: &str = "statusLine";

/// `<project_dir>/.claude/settings.json`
pub fn settings_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".claude").join("settings.json")
}

/// Typed view of the `statusLine` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    Absent,
    /// `type: "command"`; a missing or non-string command reads as empty.
    Command(String),
    /// `type: "text"` or anything else that is not a command entry.
    Text(String),
}

/// The whole settings document, loaded fresh for one run.
#[derive(Debug)]
pub struct SettingsFile {
    path: PathBuf,
    doc: Map<String, Value>,
}

impl SettingsFile {
    /// Load `path`, falling back to an empty document on any read or parse
    /// problem.
    pub fn load(path: &Path) -> Self {
        let doc = match fs::read_to_string(path) {
            Ok(content) => parse_document(path, &content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} does not exist, starting empty", path.display());
                Map::new()
            }
            Err(e) => {
                warn!("failed to read {}: {}; starting empty", path.display(), e);
                Map::new()
            }
        };
        Self {
            path: path.to_path_buf(),
            doc,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status_line(&self) -> StatusLine {
        let entry = match self.doc.get(STATUS_LINE_KEY) {
            None | Some(Value::Null) => return StatusLine::Absent,
            Some(entry) => entry,
        };
        let field = |key: &str| {
            entry
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        match entry.get("type").and_then(Value::as_str) {
            Some("command") => StatusLine::Command(field("command")),
            _ => StatusLine::Text(field("value")),
        }
    }

    /// Store `command` as the status-line command.
    ///
    /// An existing command entry keeps its other keys; anything else is
    /// replaced by a fresh command entry.
    pub fn set_command(&mut self, command: String) {
        if let Some(Value::Object(entry)) = self.doc.get_mut(STATUS_LINE_KEY) {
            if entry.get("type").and_then(Value::as_str) == Some("command") {
                entry.insert("command".to_string(), Value::String(command));
                return;
            }
        }
        self.doc.insert(
            STATUS_LINE_KEY.to_string(),
            json!({ "type": "command", "command": command }),
        );
    }

    pub fn remove_status_line(&mut self) {
        self.doc.shift_remove(STATUS_LINE_KEY);
    }

    /// Pretty-printed JSON with a trailing newline.
    pub fn render(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(&self.doc)?;
        out.push('\n');
        Ok(out)
    }

    /// Replace the file on disk with the current document.
    ///
    /// Writes a temp file next to the target and renames it over, so readers
    /// never see a half-written file.
    pub fn save(&self) -> Result<()> {
        let content = self.render()?;
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;

        let mut builder = tempfile::Builder::new();
        // Temp files default to 0600; a fresh settings file gets the usual
        // umask-derived mode instead.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(0o666));
        }
        let mut tmp = builder
            .tempfile_in(dir)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        // An existing file keeps its mode across the rename.
        if let Ok(meta) = fs::metadata(&self.path) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .with_context(|| format!("failed to write {}", self.path.display()))?;
        }
        tmp.write_all(content.as_bytes())
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        tmp.persist(&self.path)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        debug!("wrote {}", self.path.display());
        Ok(())
    }

    #[cfg(test)]
    pub fn from_value(value: Value) -> Self {
        let doc = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            path: PathBuf::from("settings.json"),
            doc,
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.doc.get(key)
    }
}

fn parse_document(path: &Path, content: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!("{} is not a JSON object; starting empty", path.display());
            Map::new()
        }
        Err(e) => {
            warn!("{} is not valid JSON ({}); starting empty", path.display(), e);
            Map::new()
        }
    }
}
