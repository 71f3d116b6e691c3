//! Implementation of the `flockwork clear` command.
//!
//! Removes the status table, task list, id counter, progress snapshot and
//! worker lock files. The config, event journal and task boards are kept.

use crate::cli::ClearArgs;
use flockwork::context::WorkDir;
use flockwork::error::{QueueError, Result};
use flockwork::identity::{Liveness, probe_liveness};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Execute the `flockwork clear` command.
pub fn cmd_clear(work: &WorkDir, args: ClearArgs) -> Result<()> {
    work.ensure_initialized()?;

    let removed = clear(work, args.force)?;

    tracing::info!(removed, force = args.force, "work directory cleared");
    println!("Removed {} file(s).", removed);
    Ok(())
}

/// Remove shared state; refuses while a worker is alive unless `force`.
pub(crate) fn clear(work: &WorkDir, force: bool) -> Result<usize> {
    let lock_files = worker_lock_files(&work.locks_dir())?;

    if !force {
        let mut alive = Vec::new();
        for path in &lock_files {
            if probe_liveness(path)? == Liveness::Alive {
                alive.push(path.display().to_string());
            }
        }
        if !alive.is_empty() {
            return Err(QueueError::UserError(format!(
                "{} worker(s) still running:\n  {}\n\nStop them first or pass --force.",
                alive.len(),
                alive.join("\n  ")
            )));
        }
    }

    let mut removed = 0;
    let shared = [
        work.status_path(),
        work.queue_path(),
        work.id_path(),
        work.progress_path(),
    ];
    for path in shared.iter().chain(lock_files.iter()) {
        if remove_if_exists(path)? {
            removed += 1;
        }
    }
    Ok(removed)
}

fn worker_lock_files(locks_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(locks_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(QueueError::io("failed to list locks directory", locks_dir, e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| QueueError::io("failed to list locks directory", locks_dir, e))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(QueueError::io("failed to remove", path, e)),
    }
}
