//! Persistent atomic deque.
//!
//! An [`AtomicDeque`] is an ordered sequence of `(id, payload)` pairs stored in
//! one lock-guarded text file (see [`codec`] for the format). Ids come from a
//! counter kept on the first line, so they are strictly increasing and never
//! reused for the lifetime of the file, even across `clear`.
//!
//! # Transactions
//!
//! Every mutation happens inside a [`Transaction`] holding the file's
//! exclusive lock. Mutations are buffered in memory and the outermost
//! `commit` rewrites the whole file once. Nested scopes ([`Transaction::nested`],
//! [`Transaction::atomic`]) share the outer lock acquisition and commit point.
//!
//! Dropping an outermost transaction without committing discards everything
//! it buffered and releases the lock; the file is untouched. Dropping a
//! nested one poisons the outer commit, which then fails with
//! [`QueueError::TransactionAborted`].
//!
//! Standalone calls on the deque (`push`, `pop`, ...) each run their own
//! transaction.
//!
//! # Caching
//!
//! Reads outside a transaction take a shared lock and reuse the last parsed
//! content while the file's modification time and length are unchanged.
//! Beginning a transaction always re-reads the file.

mod codec;
mod slice;
mod transaction;


pub use codec::FIRST_ID;
pub use slice::Slice;
pub use transaction::Transaction;

use crate::error::{QueueError, Result};
use crate::lock::{FileGuard, LockFile, LockMode};
use codec::{RawEntry, Snapshot};
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static SANITIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9-]+").expect("Invalid deque name regex"));

/// File name used for the deque called `name`.
///
/// The sanitised name keeps the file recognisable; the digest of the raw
/// name keeps names that sanitise alike apart.
pub fn file_name(name: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(name.as_bytes()));
    format!("{}.{}.deq", SANITIZE.replace_all(name, "_"), &digest[..16])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    modified: u128,
    len: u64,
}

impl Stamp {
    fn of(guard: &FileGuard<'_>) -> Result<Self> {
        Ok(Self {
            modified: guard.modified_nanos()?,
            len: guard.len()?,
        })
    }
}

#[derive(Debug)]
struct Cached {
    stamp: Stamp,
    snapshot: Snapshot,
}

/// Buffered state of an open transaction.
#[derive(Debug)]
struct Pending {
    snapshot: Snapshot,
    dirty: bool,
    poisoned: bool,
}

/// Persistent sequence of `(id, T)` pairs shared between processes.
#[derive(Debug)]
pub struct AtomicDeque<T> {
    name: String,
    lock: LockFile,
    cache: Option<Cached>,
    pending: Option<Pending>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> AtomicDeque<T> {
    /// Open (creating if needed) the deque called `name` inside `dir`.
    pub fn open(dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        let path = dir.as_ref().join(file_name(name));
        Ok(Self {
            name: name.to_string(),
            lock: LockFile::open(path)?,
            cache: None,
            pending: None,
            _payload: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        self.lock.path()
    }

    /// Whether a transaction is currently open on this handle.
    pub fn in_transaction(&self) -> bool {
        self.pending.is_some()
    }

    /// Begin an outermost transaction, taking the exclusive lock.
    ///
    /// With `wait = false` a contended lock fails with `WouldBlock`.
    pub fn begin(&mut self, wait: bool) -> Result<Transaction<'_, T>> {
        self.lock.lock(LockMode::Exclusive, wait)?;

        let mut txn = Transaction::outermost(self);
        let deque = txn.deque_mut();
        deque.refresh(LockMode::Exclusive, true)?;
        let snapshot = deque.cached()?.clone();
        deque.pending = Some(Pending {
            snapshot,
            dirty: false,
            poisoned: false,
        });
        Ok(txn)
    }

    /// Run `f` inside an outermost transaction, committing if it succeeds.
    ///
    /// An error from `f` discards every buffered mutation.
    pub fn atomic<R>(
        &mut self,
        wait: bool,
        f: impl FnOnce(&mut Transaction<'_, T>) -> Result<R>,
    ) -> Result<R> {
        let mut txn = self.begin(wait)?;
        let value = f(&mut txn)?;
        txn.commit()?;
        Ok(value)
    }

    /// Current content, from cache when the file is unchanged.
    fn snapshot(&mut self, wait: bool) -> Result<&Snapshot> {
        if wait {
            self.refresh(LockMode::Shared, false)?;
        } else {
            if !self.lock.try_lock(LockMode::Shared)? {
                return Err(QueueError::WouldBlock(self.path().to_path_buf()));
            }
            let refreshed = self.refresh(LockMode::Shared, false);
            self.lock.unlock()?;
            refreshed?;
        }
        self.cached()
    }

    fn cached(&self) -> Result<&Snapshot> {
        self.cache
            .as_ref()
            .map(|c| &c.snapshot)
            .ok_or_else(|| QueueError::Unlocked(self.path().to_path_buf()))
    }

    /// Re-read the file under `mode` unless the cache is still valid. With
    /// `force` the cache is ignored even when the stamp matches.
    fn refresh(&mut self, mode: LockMode, force: bool) -> Result<()> {
        let mut guard = self.lock.guard(mode)?;
        let stamp = Stamp::of(&guard)?;

        if !force && self.cache.as_ref().is_some_and(|c| c.stamp == stamp) {
            return Ok(());
        }

        guard.rewind()?;
        let bytes = guard.read_remaining()?;
        let text = String::from_utf8(bytes)
            .map_err(|_| QueueError::corrupt(guard.path(), "deque file is not valid UTF-8"))?;
        let snapshot = codec::parse(guard.path(), &text)?;
        drop(guard);

        self.cache = Some(Cached { stamp, snapshot });
        Ok(())
    }

    /// Rewrite the whole file. Must be called with the exclusive lock held.
    fn write_locked(&mut self, snapshot: Snapshot) -> Result<()> {
        let mut guard = self.lock.guard(LockMode::Exclusive)?;
        let path = guard.path().to_path_buf();

        guard.clear()?;
        guard
            .write_all(codec::render(&snapshot).as_bytes())
            .map_err(|e| QueueError::io("failed to write deque", &path, e))?;
        guard.force_flush()?;
        let stamp = Stamp::of(&guard)?;
        drop(guard);

        tracing::debug!(deque = %self.name, entries = snapshot.entries.len(), "deque rewritten");
        self.cache = Some(Cached { stamp, snapshot });
        Ok(())
    }

    /// Drop the open transaction's buffer and its lock.
    fn discard_pending(&mut self) {
        self.pending = None;
        if let Err(e) = self.lock.unlock() {
            tracing::warn!(deque = %self.name, error = %e, "failed to release deque lock");
        }
    }

    /// Finish the open transaction: write if anything changed, then unlock.
    fn finish_pending(&mut self) -> Result<()> {
        let written = match self.pending.take() {
            Some(Pending { poisoned: true, .. }) => {
                Err(QueueError::TransactionAborted(self.path().to_path_buf()))
            }
            Some(Pending {
                snapshot,
                dirty: true,
                ..
            }) => self.write_locked(snapshot),
            _ => Ok(()),
        };

        let unlocked = self.lock.unlock();
        written?;
        unlocked.map(|_| ())
    }
}

impl<T: Serialize + DeserializeOwned> AtomicDeque<T> {
    /// Append `items`, returning their new ids in order.
    pub fn push(&mut self, items: &[T], wait: bool) -> Result<Vec<u64>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        self.atomic(wait, |txn| txn.push(items))
    }

    /// Element at `index` (negative counts from the end), `None` if out of range.
    pub fn peek(&mut self, index: isize, wait: bool) -> Result<Option<T>> {
        let path = self.path().to_path_buf();
        let snapshot = self.snapshot(wait)?;
        match slice::resolve_index(index, snapshot.entries.len()) {
            Some(i) => codec::decode(&path, &snapshot.entries[i]).map(Some),
            None => Ok(None),
        }
    }

    pub fn peek_slice(&mut self, slice: impl Into<Slice>, wait: bool) -> Result<Vec<T>> {
        let slice: Slice = slice.into();
        let path = self.path().to_path_buf();
        let snapshot = self.snapshot(wait)?;
        slice
            .indices(snapshot.entries.len())?
            .into_iter()
            .map(|i| codec::decode(&path, &snapshot.entries[i]))
            .collect()
    }

    /// Remove and return the element at `index`.
    pub fn pop(&mut self, index: isize, wait: bool) -> Result<Option<T>> {
        self.atomic(wait, |txn| txn.pop(index))
    }

    pub fn pop_slice(&mut self, slice: impl Into<Slice>, wait: bool) -> Result<Vec<T>> {
        let slice: Slice = slice.into();
        self.atomic(wait, |txn| txn.pop_slice(slice))
    }

    /// Remove a range without decoding it. Returns how many were removed.
    pub fn delete(&mut self, slice: impl Into<Slice>, wait: bool) -> Result<usize> {
        let slice: Slice = slice.into();
        self.atomic(wait, |txn| txn.delete(slice))
    }

    /// Remove entries by id; unknown ids are ignored.
    pub fn remove(&mut self, ids: &[u64], wait: bool) -> Result<usize> {
        self.atomic(wait, |txn| txn.remove(ids))
    }

    /// Overwrite payloads in place, keeping id and position.
    pub fn replace(&mut self, pairs: &[(u64, T)], wait: bool) -> Result<usize> {
        self.atomic(wait, |txn| txn.replace(pairs))
    }

    /// Drop every entry. The id counter is kept.
    pub fn clear(&mut self, wait: bool) -> Result<()> {
        self.atomic(wait, |txn| txn.clear())
    }

    pub fn len(&mut self, wait: bool) -> Result<usize> {
        Ok(self.snapshot(wait)?.entries.len())
    }

    pub fn is_empty(&mut self, wait: bool) -> Result<bool> {
        Ok(self.len(wait)? == 0)
    }

    /// Id the next push will receive.
    pub fn next_id(&mut self, wait: bool) -> Result<u64> {
        Ok(self.snapshot(wait)?.next_id)
    }

    /// Iterate `(id, payload)` pairs oldest first, decoding lazily.
    pub fn iter(&mut self, wait: bool) -> Result<Iter<'_, T>> {
        let path = self.path().to_path_buf();
        let snapshot = self.snapshot(wait)?;
        Ok(Iter {
            path,
            entries: snapshot.entries.iter(),
            _payload: PhantomData,
        })
    }

    /// Every `(id, payload)` pair, oldest first.
    pub fn entries(&mut self, wait: bool) -> Result<Vec<(u64, T)>> {
        self.iter(wait)?.collect()
    }
}

/// Iterator over a deque's content as of the call to [`AtomicDeque::iter`].
pub struct Iter<'a, T> {
    path: PathBuf,
    entries: std::slice::Iter<'a, RawEntry>,
    _payload: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Iterator for Iter<'_, T> {
    type Item = Result<(u64, T)>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next()?;
        Some(codec::decode(&self.path, entry).map(|payload| (entry.id, payload)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}
