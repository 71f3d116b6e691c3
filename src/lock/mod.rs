//! Advisory whole-file locking for flockwork.
//!
//! Every shared file (task list, status table, id counter, deque files,
//! per-worker lock files) is only mutated while one of these locks is held.
//!
//! # Model
//!
//! A [`LockFile`] wraps one open file and tracks `unlocked | locked(mode, count)`:
//! - The OS lock (`flock`) is taken on the 0 → 1 transition only.
//! - Re-locking in the same (or a weaker) mode bumps the count.
//! - On the 1 → 0 transition an exclusive holder syncs the file to stable
//!   storage before the OS lock is dropped.
//! - Dropping the handle force-releases whatever is still held, including
//!   while unwinding.
//!
//! Locks attach to the open file description, so two handles opened on the
//! same path contend even inside a single process.
//!
//! # Guards
//!
//! File I/O is only reachable through a [`FileGuard`], which acquires on
//! creation and unlocks on every exit path.

mod guard;
mod handle;
mod types;


pub use guard::FileGuard;
pub use handle::LockFile;
pub use types::LockMode;
