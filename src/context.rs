//! Work directory context resolution for flockwork.
//!
//! A work directory holds everything a set of cooperating workers shares:
//! the task list, the status table, the worker-id counter, per-worker lock
//! files, task boards, the event journal and the progress snapshot. File
//! names come from `flockwork.yaml` in the same directory.
//!
//! All commands must use this module to locate shared state so that every
//! worker agrees on the paths.

use crate::config::{CONFIG_FILE_NAME, Config};
use crate::error::{QueueError, Result};
use crate::identity::WorkerId;
use crate::status::SlotFormat;
use std::env;
use std::path::{Path, PathBuf};

/// Resolved paths and configuration of one work directory.
///
/// All paths are absolute.
#[derive(Debug, Clone)]
pub struct WorkDir {
    /// Absolute path to the work directory.
    pub root: PathBuf,

    /// Loaded (or default) configuration.
    pub config: Config,

    /// Validated slot layout from `config`.
    pub format: SlotFormat,
}

impl WorkDir {
    /// Resolve the work directory from the current working directory.
    pub fn resolve() -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| {
            QueueError::UserError(format!("failed to get current working directory: {}", e))
        })?;

        Self::resolve_from(&cwd)
    }

    /// Resolve a specific directory, loading its config if present.
    pub fn resolve_from<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let root = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            env::current_dir()
                .map_err(|e| {
                    QueueError::UserError(format!(
                        "failed to get current working directory: {}",
                        e
                    ))
                })?
                .join(dir)
        };

        let config = Config::load_or_default(root.join(CONFIG_FILE_NAME))?;
        Self::with_config(root, config)
    }

    /// Build a context from an explicit config (validated here).
    pub fn with_config<P: Into<PathBuf>>(root: P, config: Config) -> Result<Self> {
        config.validate()?;
        let format = config.slot_format()?;
        Ok(Self {
            root: root.into(),
            config,
            format,
        })
    }

    /// Path to `flockwork.yaml`.
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// Task list (record log of task records).
    pub fn queue_path(&self) -> PathBuf {
        self.root.join(&self.config.queue_file)
    }

    /// Binary status table.
    pub fn status_path(&self) -> PathBuf {
        self.root.join(&self.config.status_file)
    }

    /// Worker-id counter.
    pub fn id_path(&self) -> PathBuf {
        self.root.join(&self.config.id_file)
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.root.join(&self.config.locks_dir)
    }

    /// Lock file held by worker `id` while it runs.
    pub fn worker_lock_path(&self, id: WorkerId) -> PathBuf {
        crate::identity::worker_lock_path(&self.locks_dir(), id)
    }

    pub fn events_path(&self) -> PathBuf {
        self.root.join(&self.config.events_file)
    }

    pub fn progress_path(&self) -> PathBuf {
        self.root.join(&self.config.progress_file)
    }

    /// Directory holding task-board deque files.
    pub fn boards_dir(&self) -> PathBuf {
        self.root.clone()
    }

    /// Check if the work directory has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.config_path().exists()
    }

    /// Ensure the work directory has been initialized, returning an error if not.
    pub fn ensure_initialized(&self) -> Result<()> {
        if !self.is_initialized() {
            return Err(QueueError::UserError(format!(
                "work directory '{}' is not initialized.\n\nRun `flockwork init` first.",
                self.root.display()
            )));
        }
        Ok(())
    }
}
