//! Explicit transaction tokens for [`AtomicDeque`].

use super::codec::{self, RawEntry, Snapshot};
use super::slice::{self, Slice};
use super::{AtomicDeque, Pending};
use crate::error::{QueueError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;

/// A scope holding the deque's exclusive lock.
///
/// Obtained from [`AtomicDeque::begin`] (outermost) or
/// [`Transaction::nested`] (child sharing the parent's commit point).
/// Reads inside a transaction see its own buffered mutations.
#[derive(Debug)]
pub struct Transaction<'d, T> {
    deque: &'d mut AtomicDeque<T>,
    outermost: bool,
    finished: bool,
}

impl<'d, T> Transaction<'d, T> {
    pub(super) fn outermost(deque: &'d mut AtomicDeque<T>) -> Self {
        Self {
            deque,
            outermost: true,
            finished: false,
        }
    }

    pub(super) fn deque_mut(&mut self) -> &mut AtomicDeque<T> {
        self.deque
    }

    /// Whether this token owns the commit point.
    pub fn is_outermost(&self) -> bool {
        self.outermost
    }

    /// Open a child scope. Its commit only returns control to this one;
    /// dropping it uncommitted poisons this transaction.
    pub fn nested(&mut self) -> Transaction<'_, T> {
        Transaction {
            deque: &mut *self.deque,
            outermost: false,
            finished: false,
        }
    }

    /// Run `f` in a child scope, committing the child if `f` succeeds.
    pub fn atomic<R>(&mut self, f: impl FnOnce(&mut Transaction<'_, T>) -> Result<R>) -> Result<R> {
        let mut child = self.nested();
        let value = f(&mut child)?;
        child.commit()?;
        Ok(value)
    }

    /// Commit this scope. Only the outermost commit touches the file.
    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        if self.outermost {
            self.deque.finish_pending()
        } else {
            Ok(())
        }
    }

    /// Abandon this scope explicitly.
    pub fn abort(self) {
        drop(self);
    }

    fn pending(&mut self) -> Result<&mut Pending> {
        let path = self.deque.path().to_path_buf();
        self.deque
            .pending
            .as_mut()
            .ok_or(QueueError::Unlocked(path))
    }

    fn pending_ref(&self) -> Result<&Snapshot> {
        self.deque
            .pending
            .as_ref()
            .map(|p| &p.snapshot)
            .ok_or_else(|| QueueError::Unlocked(self.deque.path().to_path_buf()))
    }

    /// Mutate the buffered snapshot and mark it for writing.
    fn mutate<R>(&mut self, f: impl FnOnce(&mut Snapshot) -> Result<R>) -> Result<R> {
        let pending = self.pending()?;
        let value = f(&mut pending.snapshot)?;
        pending.dirty = true;
        Ok(value)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.pending_ref()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove entries by id; unknown ids are ignored.
    pub fn remove(&mut self, ids: &[u64]) -> Result<usize> {
        let doomed: HashSet<u64> = ids.iter().copied().collect();
        self.mutate(|snapshot| {
            let before = snapshot.entries.len();
            snapshot.entries.retain(|e| !doomed.contains(&e.id));
            Ok(before - snapshot.entries.len())
        })
    }

    /// Remove a range without decoding it.
    pub fn delete(&mut self, slice: impl Into<Slice>) -> Result<usize> {
        let slice: Slice = slice.into();
        self.mutate(|snapshot| {
            let indices = slice.indices(snapshot.entries.len())?;
            remove_indices(&mut snapshot.entries, &indices);
            Ok(indices.len())
        })
    }

    /// Drop every entry. The id counter is kept.
    pub fn clear(&mut self) -> Result<()> {
        self.mutate(|snapshot| {
            snapshot.entries.clear();
            Ok(())
        })
    }
}

impl<T: Serialize + DeserializeOwned> Transaction<'_, T> {
    /// Append `items`, returning their new ids in order.
    pub fn push(&mut self, items: &[T]) -> Result<Vec<u64>> {
        let encoded = items
            .iter()
            .map(codec::encode)
            .collect::<Result<Vec<_>>>()?;

        self.mutate(|snapshot| {
            let mut ids = Vec::with_capacity(encoded.len());
            for payload in encoded {
                let id = snapshot.next_id;
                snapshot.next_id = id
                    .checked_add(1)
                    .ok_or(QueueError::IdSpaceExhausted(id))?;
                snapshot.entries.push(RawEntry { id, payload });
                ids.push(id);
            }
            Ok(ids)
        })
    }

    /// Element at `index` (negative counts from the end), `None` if out of range.
    pub fn peek(&self, index: isize) -> Result<Option<T>> {
        let snapshot = self.pending_ref()?;
        match slice::resolve_index(index, snapshot.entries.len()) {
            Some(i) => codec::decode(self.deque.path(), &snapshot.entries[i]).map(Some),
            None => Ok(None),
        }
    }

    pub fn peek_slice(&self, slice: impl Into<Slice>) -> Result<Vec<T>> {
        let slice: Slice = slice.into();
        let snapshot = self.pending_ref()?;
        slice
            .indices(snapshot.entries.len())?
            .into_iter()
            .map(|i| codec::decode(self.deque.path(), &snapshot.entries[i]))
            .collect()
    }

    /// Payload stored under `id`, if present.
    pub fn get(&self, id: u64) -> Result<Option<T>> {
        let snapshot = self.pending_ref()?;
        snapshot
            .entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| codec::decode(self.deque.path(), e))
            .transpose()
    }

    /// Remove and return the element at `index`.
    pub fn pop(&mut self, index: isize) -> Result<Option<T>> {
        let len = self.len()?;
        let Some(i) = slice::resolve_index(index, len) else {
            return Ok(None);
        };

        let item = self.peek(i as isize)?;
        self.mutate(|snapshot| {
            snapshot.entries.remove(i);
            Ok(())
        })?;
        Ok(item)
    }

    /// Remove and return a range, in slice order.
    pub fn pop_slice(&mut self, slice: impl Into<Slice>) -> Result<Vec<T>> {
        let slice: Slice = slice.into();
        let items = self.peek_slice(slice)?;
        self.delete(slice)?;
        Ok(items)
    }

    /// Overwrite payloads in place, keeping id and position. Unknown ids are
    /// ignored; returns how many entries were replaced.
    pub fn replace(&mut self, pairs: &[(u64, T)]) -> Result<usize> {
        let encoded = pairs
            .iter()
            .map(|(id, value)| Ok((*id, codec::encode(value)?)))
            .collect::<Result<Vec<_>>>()?;

        self.mutate(|snapshot| {
            let mut replaced = 0;
            for (id, payload) in encoded {
                if let Some(entry) = snapshot.entries.iter_mut().find(|e| e.id == id) {
                    entry.payload = payload;
                    replaced += 1;
                }
            }
            Ok(replaced)
        })
    }

    /// Every `(id, payload)` pair, oldest first.
    pub fn entries(&self) -> Result<Vec<(u64, T)>> {
        let snapshot = self.pending_ref()?;
        snapshot
            .entries
            .iter()
            .map(|e| codec::decode(self.deque.path(), e).map(|payload| (e.id, payload)))
            .collect()
    }
}

impl<T> Drop for Transaction<'_, T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        if self.outermost {
            tracing::debug!(deque = %self.deque.name, "transaction aborted; changes discarded");
            self.deque.discard_pending();
        } else if let Some(pending) = self.deque.pending.as_mut() {
            pending.poisoned = true;
        }
    }
}

fn remove_indices(entries: &mut Vec<RawEntry>, indices: &[usize]) {
    let doomed: HashSet<usize> = indices.iter().copied().collect();
    let mut position = 0;
    entries.retain(|_| {
        let keep = !doomed.contains(&position);
        position += 1;
        keep
    });
}
