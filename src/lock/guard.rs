//! Scoped lock guard: the only way to do I/O on a [`LockFile`].

use super::handle::LockFile;
use super::types::LockMode;
use crate::error::{QueueError, Result};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// RAII guard over one acquisition of a [`LockFile`].
///
/// When dropped, the acquisition is released (and, if it was the last one,
/// the file is synced and unlocked). If releasing fails during drop, a
/// warning is logged but no panic occurs.
#[derive(Debug)]
pub struct FileGuard<'a> {
    lock: &'a mut LockFile,
    released: bool,
}

impl<'a> FileGuard<'a> {
    pub(super) fn new(lock: &'a mut LockFile) -> Self {
        Self {
            lock,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        self.lock.path()
    }

    /// Mode held by the underlying handle.
    pub fn mode(&self) -> LockMode {
        self.lock.mode().unwrap_or(LockMode::Shared)
    }

    /// The locked file, for memory mapping and positional access.
    pub fn file(&self) -> &File {
        self.lock.file()
    }

    /// Current file length in bytes.
    pub fn len(&self) -> Result<u64> {
        self.file()
            .metadata()
            .map(|m| m.len())
            .map_err(|e| QueueError::io("failed to stat file", self.path(), e))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Modification time of the file as nanoseconds since the epoch.
    pub fn modified_nanos(&self) -> Result<u128> {
        let modified = self
            .file()
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| QueueError::io("failed to stat file", self.path(), e))?;

        Ok(modified
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default())
    }

    /// Seek to the start of the file.
    pub fn rewind(&mut self) -> Result<()> {
        let path = self.path().to_path_buf();
        self.seek(SeekFrom::Start(0))
            .map(|_| ())
            .map_err(|e| QueueError::io("failed to seek", path, e))
    }

    /// Truncate to zero length and seek to the start.
    pub fn clear(&mut self) -> Result<()> {
        self.rewind()?;
        self.file()
            .set_len(0)
            .map_err(|e| QueueError::io("failed to truncate file", self.path(), e))
    }

    /// Flush and force written data to stable storage.
    pub fn force_flush(&mut self) -> Result<()> {
        let path = self.path().to_path_buf();
        self.flush()
            .and_then(|_| self.file().sync_data())
            .map_err(|e| QueueError::io("failed to sync file", path, e))
    }

    /// Read everything from the current position to the end.
    pub fn read_remaining(&mut self) -> Result<Vec<u8>> {
        let path = self.path().to_path_buf();
        let mut buf = Vec::new();
        self.read_to_end(&mut buf)
            .map_err(|e| QueueError::io("failed to read file", path, e))?;
        Ok(buf)
    }

    /// Release explicitly, surfacing any sync/unlock error.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.lock.unlock().map(|_| ())
    }
}

impl Read for FileGuard<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut file = self.lock.file();
        file.read(buf)
    }
}

impl Write for FileGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.lock.file();
        file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self.lock.file();
        file.flush()
    }
}

impl Seek for FileGuard<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let mut file = self.lock.file();
        file.seek(pos)
    }
}

impl Drop for FileGuard<'_> {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = self.lock.unlock()
        {
            tracing::warn!(path = %self.lock.path().display(), error = %e, "failed to release lock");
        }
    }
}
