//! Error types for flockwork.
//!
//! Uses thiserror for derive macros. Lock contention observed by a liveness
//! probe is not an error (it is reported as a boolean); everything here is a
//! condition the caller has to act on.

use crate::exit_codes;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Boxed error produced by caller-supplied task logic.
pub type TaskError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for flockwork operations.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Filesystem operation failed.
    #[error("{context} '{}': {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be loaded or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Non-reentrant or mode-changing lock requested on a handle that already holds one.
    #[error("file already locked: {}", .0.display())]
    AlreadyLocked(PathBuf),

    /// A non-blocking lock attempt found the file locked by someone else.
    #[error("file is locked by another process: {}", .0.display())]
    WouldBlock(PathBuf),

    /// File access was attempted through a handle that holds no lock.
    #[error("file is not locked: {}", .0.display())]
    Unlocked(PathBuf),

    /// Persistent data could not be decoded.
    #[error("corrupt data in '{}': {detail}", .path.display())]
    Corrupt { path: PathBuf, detail: String },

    /// A nested transaction scope was abandoned; the outer transaction wrote nothing.
    #[error("transaction on '{}' aborted by a nested scope; changes discarded", .0.display())]
    TransactionAborted(PathBuf),

    /// The worker-id counter no longer fits in the configured slot width.
    #[error("worker id space exhausted: {0} does not fit in the status table slot")]
    IdSpaceExhausted(u64),

    /// The status table references a task position the task list does not have.
    #[error("task list has no entry for position {0}")]
    MissingTask(usize),

    /// Caller-supplied task logic returned an error; the task stays claimed.
    #[error("task {task} failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: TaskError,
    },

    /// The run loop was stopped from outside (signal or stop handle).
    #[error("interrupted")]
    Interrupted,

    /// User provided invalid arguments or the work dir is in an invalid state.
    #[error("{0}")]
    UserError(String),
}

impl QueueError {
    /// Wrap an I/O error with what was being attempted and on which path.
    pub fn io(context: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        QueueError::Io {
            context,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Build a corruption error for `path`.
    pub fn corrupt(path: impl AsRef<Path>, detail: impl Into<String>) -> Self {
        QueueError::Corrupt {
            path: path.as_ref().to_path_buf(),
            detail: detail.into(),
        }
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            QueueError::Io { .. } => exit_codes::USER_ERROR,
            QueueError::Config(_) => exit_codes::USER_ERROR,
            QueueError::UserError(_) => exit_codes::USER_ERROR,
            QueueError::MissingTask(_) => exit_codes::USER_ERROR,
            QueueError::IdSpaceExhausted(_) => exit_codes::USER_ERROR,
            QueueError::AlreadyLocked(_) => exit_codes::LOCK_FAILURE,
            QueueError::WouldBlock(_) => exit_codes::LOCK_FAILURE,
            QueueError::Unlocked(_) => exit_codes::LOCK_FAILURE,
            QueueError::TransactionAborted(_) => exit_codes::LOCK_FAILURE,
            QueueError::Corrupt { .. } => exit_codes::CORRUPTION,
            QueueError::TaskFailed { .. } => exit_codes::TASK_FAILURE,
            QueueError::Interrupted => exit_codes::INTERRUPTED,
        }
    }
}

/// Result type alias for flockwork operations.
pub type Result<T> = std::result::Result<T, QueueError>;
