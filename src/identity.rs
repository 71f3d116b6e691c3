//! Worker identity and liveness.
//!
//! A worker gets its id by incrementing a shared counter file under an
//! exclusive lock, then holds its own lock file (`<locks_dir>/<id>`)
//! exclusively for the rest of its run. Other workers probe that file: if
//! they can lock it, its owner is gone.

use crate::error::{QueueError, Result};
use crate::lock::{LockFile, LockMode};
use crate::status::SlotFormat;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Identifier of one worker run. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub u64);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of probing a peer's lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Someone holds the lock.
    Alive,
    /// The lock was free or the file does not exist.
    Dead,
}

/// Path of the lock file owned by worker `id`.
pub fn worker_lock_path(locks_dir: &Path, id: WorkerId) -> PathBuf {
    locks_dir.join(id.to_string())
}

/// Read-increment-write the worker-id counter under its exclusive lock.
pub fn next_worker_id(id_file: &Path, format: SlotFormat) -> Result<WorkerId> {
    let mut lock = LockFile::open(id_file)?;
    let mut guard = lock.guard(LockMode::Exclusive)?;

    guard.rewind()?;
    let current = guard.read_remaining()?;
    let last = format.decode_value(&current);

    let next = last.saturating_add(1);
    if last == u64::MAX || next > format.max_worker_id() {
        return Err(QueueError::IdSpaceExhausted(next));
    }

    guard.clear()?;
    guard
        .write_all(&format.encode_value(next))
        .map_err(|e| QueueError::io("failed to write worker id counter", id_file, e))?;
    guard.force_flush()?;

    Ok(WorkerId(next))
}

/// Probe whether the worker owning `lock_path` is still running.
///
/// Never creates the file. A lock acquired for the probe is released
/// before returning.
pub fn probe_liveness(lock_path: &Path) -> Result<Liveness> {
    let mut lock = match LockFile::open_read_only(lock_path) {
        Ok(lock) => lock,
        Err(QueueError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Liveness::Dead);
        }
        Err(e) => return Err(e),
    };

    if lock.try_lock(LockMode::Exclusive)? {
        lock.unlock()?;
        Ok(Liveness::Dead)
    } else {
        Ok(Liveness::Alive)
    }
}

/// A live worker identity: an id plus its exclusively held lock file.
///
/// Dropping it removes the lock file (best effort) and releases the lock.
#[derive(Debug)]
pub struct WorkerIdentity {
    id: WorkerId,
    lock: LockFile,
    remove_on_drop: bool,
}

impl WorkerIdentity {
    /// Allocate a fresh id and take its lock file.
    pub fn acquire(id_file: &Path, locks_dir: &Path, format: SlotFormat) -> Result<Self> {
        let id = next_worker_id(id_file, format)?;
        let mut lock = LockFile::open(worker_lock_path(locks_dir, id))?;
        lock.lock_once(LockMode::Exclusive, false)?;

        tracing::debug!(worker = %id, path = %lock.path().display(), "worker identity acquired");
        Ok(Self {
            id,
            lock,
            remove_on_drop: true,
        })
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn lock_path(&self) -> &Path {
        self.lock.path()
    }

    /// Release the lock but leave the lock file behind, as a crashed
    /// process would.
    pub fn abandon(mut self) {
        self.remove_on_drop = false;
    }
}

impl Drop for WorkerIdentity {
    fn drop(&mut self) {
        if self.remove_on_drop
            && let Err(e) = std::fs::remove_file(self.lock.path())
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(worker = %self.id, error = %e, "failed to remove worker lock file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn acquire(temp: &TempDir) -> WorkerIdentity {
        WorkerIdentity::acquire(
            &temp.path().join("id"),
            &temp.path().join("locks"),
            SlotFormat::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_ids_are_sequential_from_one() {
        let temp = TempDir::new().unwrap();
        let a = acquire(&temp);
        let b = acquire(&temp);

        assert_eq!(a.id(), WorkerId(1));
        assert_eq!(b.id(), WorkerId(2));
        assert_eq!(std::fs::read(temp.path().join("id")).unwrap(), vec![2, 0]);
    }

    #[test]
    fn test_counter_survives_restarts() {
        let temp = TempDir::new().unwrap();
        drop(acquire(&temp));
        drop(acquire(&temp));

        assert_eq!(acquire(&temp).id(), WorkerId(3));
    }

    #[test]
    fn test_live_worker_probes_alive() {
        let temp = TempDir::new().unwrap();
        let worker = acquire(&temp);

        assert!(worker.lock_path().exists());
        assert_eq!(probe_liveness(worker.lock_path()).unwrap(), Liveness::Alive);
        // Probing twice does not disturb the owner.
        assert_eq!(probe_liveness(worker.lock_path()).unwrap(), Liveness::Alive);
    }

    #[test]
    fn test_clean_exit_removes_lock_file() {
        let temp = TempDir::new().unwrap();
        let worker = acquire(&temp);
        let path = worker.lock_path().to_path_buf();

        drop(worker);

        assert!(!path.exists());
        assert_eq!(probe_liveness(&path).unwrap(), Liveness::Dead);
        // The probe did not recreate it.
        assert!(!path.exists());
    }

    #[test]
    fn test_abandoned_lock_file_probes_dead() {
        let temp = TempDir::new().unwrap();
        let worker = acquire(&temp);
        let path = worker.lock_path().to_path_buf();

        worker.abandon();

        assert!(path.exists());
        assert_eq!(probe_liveness(&path).unwrap(), Liveness::Dead);
        // The probe released what it took.
        assert_eq!(probe_liveness(&path).unwrap(), Liveness::Dead);
    }

    #[test]
    fn test_id_space_exhaustion() {
        let temp = TempDir::new().unwrap();
        let id_file = temp.path().join("id");
        std::fs::write(&id_file, [0xFE]).unwrap();
        let format = SlotFormat::new(1, 0xAA).unwrap();

        let err = WorkerIdentity::acquire(&id_file, &temp.path().join("locks"), format).unwrap_err();

        assert!(matches!(err, QueueError::IdSpaceExhausted(0xFF)));
        assert_eq!(std::fs::read(&id_file).unwrap(), vec![0xFE]);
    }

    #[test]
    fn test_worker_lock_path() {
        assert_eq!(
            worker_lock_path(Path::new("/w/locks"), WorkerId(42)),
            PathBuf::from("/w/locks/42")
        );
    }
}
