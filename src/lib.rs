//! Flockwork: crash-tolerant work distribution coordinated through the filesystem.
//!
//! Independent worker processes share a work directory and coordinate only
//! through advisory file locks:
//!
//! - [`lock`]: reentrant advisory locks on open files
//! - [`record_log`]: append-only logs of JSON records
//! - [`deque`]: a persistent, transactional double-ended queue
//! - [`status`]: the memory-mapped task status table
//! - [`worker`]: worker identity, claiming, stealing and the run loop
//! - [`starvation`]: background detection of workers stuck waiting
//!
//! The `flockwork` binary wraps these in a CLI.

pub mod config;
pub mod context;
pub mod deque;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fs;
pub mod identity;
pub mod lock;
pub mod progress;
pub mod record_log;
pub mod signals;
pub mod starvation;
pub mod status;
pub mod task;
pub mod worker;
