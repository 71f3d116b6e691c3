//! Reentrant lock handle over one open file.

use super::guard::FileGuard;
use super::types::LockMode;
use crate::error::{QueueError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy)]
struct Held {
    mode: LockMode,
    count: usize,
}

/// An open file plus the advisory lock state this handle holds on it.
///
/// The raw file is deliberately not exposed; use [`LockFile::guard`] to get a
/// scoped [`FileGuard`] that can read and write.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    file: File,
    writable: bool,
    held: Option<Held>,
}

impl LockFile {
    /// Open `path` for reading and writing, creating it (and its parent
    /// directories) if it does not exist. Existing content is kept.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)
                .map_err(|e| QueueError::io("failed to create directory", parent, e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| QueueError::io("failed to open file", path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            writable: true,
            held: None,
        })
    }

    /// Open an existing file read-only. Only shared locks make sense on it.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| QueueError::io("failed to open file", path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            writable: false,
            held: None,
        })
    }

    /// Path this handle was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mode currently held, if any.
    pub fn mode(&self) -> Option<LockMode> {
        self.held.map(|h| h.mode)
    }

    /// Number of outstanding (reentrant) acquisitions.
    pub fn lock_count(&self) -> usize {
        self.held.map_or(0, |h| h.count)
    }

    pub fn is_locked(&self) -> bool {
        self.held.is_some()
    }

    /// Acquire the lock, reentrantly.
    ///
    /// If this handle already holds a lock that covers `mode`, the count is
    /// bumped and no system call is made. Asking for exclusive while holding
    /// shared is rejected with `AlreadyLocked` (no upgrades).
    ///
    /// With `wait = false` a contended lock fails with `WouldBlock`.
    pub fn lock(&mut self, mode: LockMode, wait: bool) -> Result<()> {
        if let Some(held) = self.held.as_mut() {
            if !held.mode.covers(mode) {
                return Err(QueueError::AlreadyLocked(self.path.clone()));
            }
            held.count += 1;
            return Ok(());
        }

        self.acquire(mode, wait)
    }

    /// Acquire the lock, refusing reentry.
    ///
    /// Fails with `AlreadyLocked` if this handle already holds any lock.
    pub fn lock_once(&mut self, mode: LockMode, wait: bool) -> Result<()> {
        if self.held.is_some() {
            return Err(QueueError::AlreadyLocked(self.path.clone()));
        }

        self.acquire(mode, wait)
    }

    /// Non-blocking, reentrant acquisition.
    ///
    /// Returns `Ok(false)` when another handle holds a conflicting lock.
    pub fn try_lock(&mut self, mode: LockMode) -> Result<bool> {
        match self.lock(mode, false) {
            Ok(()) => Ok(true),
            Err(QueueError::WouldBlock(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Drop one acquisition. On the last one, sync (if exclusive) and release
    /// the OS lock.
    ///
    /// Returns `Ok(false)` if the handle held nothing.
    pub fn unlock(&mut self) -> Result<bool> {
        let Some(held) = self.held.as_mut() else {
            return Ok(false);
        };

        held.count -= 1;
        if held.count == 0 {
            self.release()?;
        }

        Ok(true)
    }

    /// Release the OS lock regardless of the reentrancy count.
    pub fn unlock_all(&mut self) -> Result<()> {
        if self.held.is_some() {
            self.release()?;
        }
        Ok(())
    }

    /// Lock (blocking, reentrant) and return a scoped guard that unlocks on drop.
    pub fn guard(&mut self, mode: LockMode) -> Result<FileGuard<'_>> {
        self.lock(mode, true)?;
        Ok(FileGuard::new(self))
    }

    /// Non-blocking variant of [`LockFile::guard`]; `None` when contended.
    pub fn try_guard(&mut self, mode: LockMode) -> Result<Option<FileGuard<'_>>> {
        if self.try_lock(mode)? {
            Ok(Some(FileGuard::new(self)))
        } else {
            Ok(None)
        }
    }

    /// Duplicate the underlying descriptor for streaming reads.
    ///
    /// The duplicate shares the open file description, and therefore this
    /// handle's lock; it must not outlive the lock. Fails with `Unlocked` if
    /// nothing is held.
    pub fn duplicate(&self) -> Result<File> {
        if self.held.is_none() {
            return Err(QueueError::Unlocked(self.path.clone()));
        }
        self.file
            .try_clone()
            .map_err(|e| QueueError::io("failed to duplicate file handle", &self.path, e))
    }

    pub(super) fn file(&self) -> &File {
        &self.file
    }

    fn acquire(&mut self, mode: LockMode, wait: bool) -> Result<()> {
        let outcome = match (mode, wait) {
            (LockMode::Shared, true) => FileExt::lock_shared(&self.file),
            (LockMode::Exclusive, true) => FileExt::lock_exclusive(&self.file),
            (LockMode::Shared, false) => FileExt::try_lock_shared(&self.file),
            (LockMode::Exclusive, false) => FileExt::try_lock_exclusive(&self.file),
        };

        outcome.map_err(|e| {
            if !wait && is_contended(&e) {
                QueueError::WouldBlock(self.path.clone())
            } else {
                QueueError::io("failed to lock file", &self.path, e)
            }
        })?;

        self.held = Some(Held { mode, count: 1 });
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        // The OS lock is dropped even if the sync fails; the sync error is still reported.
        let synced = match self.held.take() {
            Some(Held {
                mode: LockMode::Exclusive,
                ..
            }) if self.writable => self
                .file
                .sync_all()
                .map_err(|e| QueueError::io("failed to sync file", &self.path, e)),
            _ => Ok(()),
        };

        FileExt::unlock(&self.file)
            .map_err(|e| QueueError::io("failed to unlock file", &self.path, e))?;

        synced
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = self.unlock_all() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release lock");
        }
    }
}

/// Whether an error from a non-blocking `flock` means "someone else holds it".
pub(crate) fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
