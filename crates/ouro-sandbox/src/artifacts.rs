//! Artifact discovery and cleanup in the sandbox working directory

use ouro_core::fail_open::fail_open_sync;
use ouro_core::{OuroError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Files in `dir` (non-recursive) with one of `extensions`, grouped by
/// extension in the given order and sorted by name within each group
pub fn discover_artifacts(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let base = glob::Pattern::escape(&dir.to_string_lossy());
    let mut found = Vec::new();

    for ext in extensions {
        let pattern = format!("{}/*.{}", base, ext);
        let entries = glob::glob(&pattern)
            .map_err(|e| OuroError::Other(format!("Invalid artifact pattern {}: {}", pattern, e)))?;

        let mut matches: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect();
        matches.sort();
        found.extend(matches);
    }

    Ok(found)
}

/// Remove artifacts and the script file left by a previous run.
///
/// Best effort: files that cannot be removed are logged and skipped.
/// Returns the number of files removed.
pub fn sweep_artifacts(dir: &Path, extensions: &[String], script_name: &str) -> usize {
    let mut targets = fail_open_sync("artifact_discovery", || {
        discover_artifacts(dir, extensions)
    })
    .unwrap_or_default();

    let script = dir.join(script_name);
    if script.is_file() {
        targets.push(script);
    }

    let mut removed = 0;
    for path in targets {
        let outcome = fail_open_sync("artifact_sweep", || {
            std::fs::remove_file(&path).map_err(OuroError::from)
        });
        if outcome.is_some() {
            debug!("Removed {}", path.display());
            removed += 1;
        }
    }
    removed
}
