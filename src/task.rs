//! Task records and task-list generation.
//!
//! The task list is a record log of [`TaskRecord`]s; a task's position in
//! the log is its slot in the status table. Tasks are only ever appended.

use crate::context::WorkDir;
use crate::error::Result;
use crate::lock::{LockFile, LockMode};
use crate::record_log;
use crate::status::StatusTable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One entry of the task list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Command line run by the `work` command.
    pub command: String,

    /// When the task was added.
    pub added_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            added_at: Utc::now(),
        }
    }
}

/// Result of [`add_tasks`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOutcome {
    /// Commands appended, in order.
    pub added: Vec<String>,
    /// Commands already present (or repeated in the input).
    pub skipped: Vec<String>,
    /// Length of the task list afterwards.
    pub total: usize,
}

/// Append commands not already in the task list and grow the status table
/// to match.
///
/// The status table lock is taken before the task list lock, the same order
/// workers use, and both are held until the table has grown.
pub fn add_tasks(work: &WorkDir, commands: &[String]) -> Result<AddOutcome> {
    let mut table = StatusTable::open(work.status_path(), work.format)?;
    let mut view = table.view()?;

    let mut queue = LockFile::open(work.queue_path())?;
    let mut guard = queue.guard(LockMode::Exclusive)?;

    let existing: Vec<TaskRecord> = record_log::read_locked(&mut guard)?;
    let mut seen: HashSet<String> = existing.iter().map(|t| t.command.clone()).collect();

    let mut outcome = AddOutcome::default();
    let mut fresh = Vec::new();
    for command in commands {
        if seen.insert(command.clone()) {
            fresh.push(TaskRecord::new(command.clone()));
            outcome.added.push(command.clone());
        } else {
            outcome.skipped.push(command.clone());
        }
    }

    record_log::append_locked(&mut guard, &fresh)?;
    outcome.total = existing.len() + fresh.len();

    view.grow_to(outcome.total)?;
    view.flush()?;

    tracing::info!(
        added = outcome.added.len(),
        skipped = outcome.skipped.len(),
        total = outcome.total,
        "tasks added"
    );
    Ok(outcome)
}

/// Read the whole task list.
pub fn read_tasks(work: &WorkDir) -> Result<Vec<TaskRecord>> {
    record_log::read_all(work.queue_path())
}
