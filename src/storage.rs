//! The per-directory file that remembers which topics were picked last time.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::selection::PersistedSelection;

enum Stored {
    Nothing,
    Selection(PersistedSelection),
    Unreadable(std::io::Error),
    Corrupt(serde_json::Error),
}

/// Loads the selection remembered by the previous run. Never fails: anything
/// that cannot be used starts the picker from a blank checklist, and a file
/// that does not parse is set aside so the next save does not overwrite it.
pub fn load_selection(path: &Path) -> PersistedSelection {
    match read_stored(path) {
        Stored::Nothing => PersistedSelection::new(),
        Stored::Selection(selection) => {
            debug!("remembered {} topic(s) from {}", selection.len(), path.display());
            selection
        }
        Stored::Unreadable(err) => {
            warn!("ignoring remembered selection {}: {err}", path.display());
            PersistedSelection::new()
        }
        Stored::Corrupt(err) => {
            set_aside(path, &err);
            PersistedSelection::new()
        }
    }
}

/// Remembers `selection` for the next run. The file is staged next to the
/// target and renamed over it, so a crash leaves either the old or the new
/// selection.
pub fn save_selection(path: &Path, selection: &PersistedSelection) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create selection directory {}", dir.display()))?;
    }

    let payload =
        serde_json::to_vec_pretty(selection).context("failed to encode topic selection")?;
    let staged = path.with_extension("tmp");
    fs::write(&staged, payload)
        .with_context(|| format!("failed to stage topic selection at {}", staged.display()))?;

    if let Err(err) = fs::rename(&staged, path) {
        let _ = fs::remove_file(&staged);
        return Err(err)
            .with_context(|| format!("failed to remember topic selection in {}", path.display()));
    }

    debug!("remembered {} topic(s) in {}", selection.len(), path.display());
    Ok(())
}

fn read_stored(path: &Path) -> Stored {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Stored::Nothing,
        Err(err) => return Stored::Unreadable(err),
    };

    if content.trim().is_empty() {
        return Stored::Nothing;
    }

    match serde_json::from_str(&content) {
        Ok(selection) => Stored::Selection(selection),
        Err(err) => Stored::Corrupt(err),
    }
}

fn set_aside(path: &Path, reason: &serde_json::Error) {
    let backup = corrupt_backup_path(path);
    match fs::rename(path, &backup) {
        Ok(()) => warn!(
            "remembered selection {} does not parse ({reason}); kept as {} and starting blank",
            path.display(),
            backup.display()
        ),
        Err(err) => warn!(
            "remembered selection {} does not parse ({reason}) and could not be set aside: {err}",
            path.display()
        ),
    }
}

fn corrupt_backup_path(path: &Path) -> PathBuf {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    path.with_extension(format!("corrupt-{secs}.json"))
}
