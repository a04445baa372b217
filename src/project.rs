//! Project manifest and build step
//!
//! A `package.json` in the project root may name a build command under
//! `scripts.build` (or `scripts.now-build`). It runs once, in the background,
//! after the server is listening.

use crate::config::Config;
use crate::error::BuildError;
use crate::logger;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

const BUILD_SCRIPTS: [&str; 2] = ["build", "now-build"];

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    scripts: HashMap<String, String>,
}

/// Build command named by the manifest at `path`
///
/// A missing manifest means no build step. An unreadable one is logged and
/// treated the same way.
pub fn build_command(path: &Path) -> Option<String> {
    let raw = std::fs::read(path).ok()?;
    let manifest: Manifest = match serde_json::from_slice(&raw) {
        Ok(manifest) => manifest,
        Err(e) => {
            logger::log_warning(&format!("Ignoring invalid manifest {}: {e}", path.display()));
            return None;
        }
    };
    BUILD_SCRIPTS
        .iter()
        .filter_map(|name| manifest.scripts.get(*name))
        .find(|command| !command.trim().is_empty())
        .cloned()
}

/// Run `command` through `sh -c` in `cwd`, returning how long it took
pub async fn run_build(command: &str, cwd: &Path) -> Result<Duration, BuildError> {
    let started = Instant::now();
    let status = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|source| BuildError::Spawn {
            command: command.to_string(),
            source,
        })?;

    if status.success() {
        Ok(started.elapsed())
    } else {
        Err(BuildError::Failed {
            command: command.to_string(),
            status,
        })
    }
}

/// Start the manifest's build command in the background, if there is one
///
/// Must be called from within a `LocalSet`.
pub fn spawn_build(config: &Config) {
    let Some(command) = build_command(&config.manifest_path()) else {
        return;
    };
    let root = config.root_dir();

    logger::log_info(&format!("Running '{command}'"));
    tokio::task::spawn_local(async move {
        match run_build(&command, &root).await {
            Ok(elapsed) => logger::log_success_timed(&format!("Done '{command}'"), elapsed),
            Err(e) => logger::log_error(&format!("Script crashed: {e}")),
        }
    });
}
