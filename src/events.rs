//! Event journal for flockwork.
//!
//! Workers append one JSON object per line to `events.ndjson` in the work
//! directory, through the same record log used for the task list. The
//! journal is an audit trail for recovery: it shows who claimed, stole and
//! finished what, and which workers starved.
//!
//! # Event Format
//!
//! Each event is a JSON object with the following fields:
//! - `ts`: RFC3339 timestamp
//! - `action`: what happened (worker_start, claim, steal, complete, ...)
//! - `actor`: the owner string (e.g., `user@HOST`)
//! - `worker`: optional worker id
//! - `details`: freeform object with action-specific details
//!
//! # Usage
//!
//! ```no_run
//! use flockwork::context::WorkDir;
//! use flockwork::events::{Event, EventAction, append_event};
//! use flockwork::identity::WorkerId;
//! use serde_json::json;
//!
//! let work = WorkDir::resolve()?;
//! let event = Event::new(EventAction::Claim)
//!     .with_worker(WorkerId(3))
//!     .with_details(json!({"positions": [0, 1]}));
//! append_event(&work, &event)?;
//! # Ok::<(), flockwork::error::QueueError>(())
//! ```

use crate::context::WorkDir;
use crate::error::{QueueError, Result};
use crate::identity::WorkerId;
use crate::record_log;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Worker obtained its identity
    WorkerStart,
    /// Free tasks claimed
    Claim,
    /// Tasks taken over from a dead worker
    Steal,
    /// Task finished and marked done
    Complete,
    /// Nothing claimable but peers are busy
    Wait,
    /// Starvation monitor fired
    Starved,
    /// Worker left its loop
    WorkerExit,
    /// Claimed slots reset to free by an operator
    Release,
    /// Tasks appended to the task list
    Add,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::WorkerStart => write!(f, "worker_start"),
            EventAction::Claim => write!(f, "claim"),
            EventAction::Steal => write!(f, "steal"),
            EventAction::Complete => write!(f, "complete"),
            EventAction::Wait => write!(f, "wait"),
            EventAction::Starved => write!(f, "starved"),
            EventAction::WorkerExit => write!(f, "worker_exit"),
            EventAction::Release => write!(f, "release"),
            EventAction::Add => write!(f, "add"),
        }
    }
}

/// An event record for the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// RFC3339 timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// The action that was performed.
    pub action: EventAction,

    /// The actor who performed the action (e.g., `user@HOST`).
    pub actor: String,

    /// Worker that performed the action, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerId>,

    /// Freeform details object with action-specific information.
    pub details: Value,
}

impl Event {
    /// Create a new event stamped now, with the actor taken from the
    /// environment (USER@HOSTNAME).
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: get_actor_string(),
            worker: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_worker(mut self, worker: WorkerId) -> Self {
        self.worker = Some(worker);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| QueueError::UserError(format!("failed to serialize event to JSON: {}", e)))
    }
}

/// Get the actor string for event metadata.
fn get_actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Append an event to the journal, creating the file if needed.
///
/// The append happens under the journal's exclusive lock and is synced
/// before returning.
pub fn append_event(work: &WorkDir, event: &Event) -> Result<()> {
    record_log::append(work.events_path(), std::slice::from_ref(event))?;
    Ok(())
}

/// Append an event, logging instead of failing.
///
/// Used from the worker loop, where a journal write error must not abort
/// work that has already been claimed.
pub fn record(work: &WorkDir, event: Event) {
    if let Err(e) = append_event(work, &event) {
        tracing::warn!(action = %event.action, error = %e, "failed to append event");
    }
}

/// Read the whole journal, oldest first.
pub fn read_events(work: &WorkDir) -> Result<Vec<Event>> {
    record_log::read_all(work.events_path())
}
