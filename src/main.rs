//! Toggle the agent-dispatcher status-line fragment in a project's settings.
//!
//! The host reads `statusLine` from `<project>/.claude/settings.json`. Several
//! plugins may share its `command` string, so this tool edits only its own
//! fragment:
//!
//! - **enable** (default) — insert the fragment, refresh it, or migrate a
//!   legacy one in place
//! - **disable** — strip the fragment, dropping `statusLine` if nothing remains
//! - **--status** — report the current state without writing

mod fragment;
mod quote;
mod settings;
mod toggle;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, warn};
use std::env;
use std::path::PathBuf;
use toggle::Action;

#[derive(Parser)]
#[command(
    name = "statusline-toggle",
    about = "Enable or disable the agent-dispatcher status line for a project"
)]
struct Cli {
    /// enable (default) or disable. Case-insensitive; unknown values enable.
    #[arg(default_value = "enable")]
    action: String,

    /// Report whether the status line is enabled without changing anything
    #[arg(long)]
    status: bool,

    /// Project directory holding .claude/settings.json (default: current directory)
    #[arg(long, env = "CLAUDE_PROJECT_DIR")]
    project_dir: Option<String>,

    /// Interpreter that runs the status-line script (default: `node` from PATH)
    #[arg(long, env = "STATUSLINE_RUNNER")]
    runner: Option<String>,
}

const DEFAULT_RUNNER: &str = "node";

/// Empty values count as unset, matching how the host exports variables.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn resolve_project_dir(explicit: Option<String>) -> Result<PathBuf> {
    match non_empty(explicit) {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => env::current_dir().context("failed to determine current directory"),
    }
}

/// Locate `name` on `path_var`, returning the first regular file found.
fn find_on_path(name: &str, path_var: Option<&std::ffi::OsStr>) -> Option<PathBuf> {
    env::split_paths(path_var?)
        .filter(|dir| dir.is_absolute())
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn resolve_runner(explicit: Option<String>) -> String {
    if let Some(runner) = non_empty(explicit) {
        return runner;
    }
    let path_var = env::var_os("PATH");
    match find_on_path(DEFAULT_RUNNER, path_var.as_deref()) {
        Some(found) => found.to_string_lossy().into_owned(),
        None => {
            warn!("{DEFAULT_RUNNER} not found on PATH; embedding bare name");
            DEFAULT_RUNNER.to_string()
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let project_dir = resolve_project_dir(cli.project_dir)?;
    let path = settings::settings_path(&project_dir);
    let mut settings = settings::SettingsFile::load(&path);
    debug!("using {}", settings.path().display());

    let action = if cli.status {
        Action::Status
    } else {
        Action::parse_lenient(&cli.action)
    };
    let outcome = match action {
        Action::Enable => {
            let runner = resolve_runner(cli.runner);
            debug!("runner: {runner}");
            let manager = fragment::FragmentManager::new(&runner)?;
            toggle::enable(&mut settings, &manager)
        }
        Action::Disable => toggle::disable(&mut settings),
        Action::Status => toggle::status(&settings),
    };

    if outcome.persists() {
        settings.save()?;
    } else {
        debug!("no changes written");
    }
    println!("{outcome}");
    Ok(())
}
