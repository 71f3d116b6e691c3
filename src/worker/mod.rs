//! Worker coordination.
//!
//! A [`Coordinator`] owns one worker identity and drives a claim loop over a
//! [`WorkSource`]:
//!
//! ```text
//! Idle → Claiming → Executing → Completing → (Idle | Waiting | Exiting)
//! ```
//!
//! - Claiming: take free tasks first, then hand back own unrun tasks, then
//!   steal from dead peers. Live peers holding tasks are reported busy.
//! - Nothing claimed and nobody busy: the queue is exhausted, exit.
//! - Nothing claimed but peers busy: back off with the starvation monitor
//!   armed, then claim again.
//! - Otherwise run each task and mark it complete.
//!
//! Two substrates implement [`WorkSource`]: [`StatusSource`] (positional,
//! status table + task list) and [`TaskBoard`] (id-tagged, atomic deque).

mod board;
mod coordinator;
mod hooks;
mod source;


pub use board::{BoardEntry, TaskBoard};
pub use coordinator::{Coordinator, RunSummary};
pub use hooks::{NoHooks, StopHandle, WorkerHooks};
pub use source::{ClaimBatch, ClaimedTask, StatusSource, WorkSource};
