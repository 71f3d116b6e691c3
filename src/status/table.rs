//! Memory-mapped access to the status table file.

use super::format::{DONE_BYTE, FREE_BYTE, SlotFormat, SlotState};
use super::scan::{ScanKind, SlotScan};
use crate::error::{QueueError, Result};
use crate::identity::WorkerId;
use crate::lock::{FileGuard, LockFile, LockMode};
use memmap2::{Mmap, MmapMut};
use std::collections::BTreeMap;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

/// Slot tallies of a status table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub free: usize,
    pub claimed: usize,
    pub done: usize,
    /// Records whose separator byte is wrong.
    pub invalid: usize,
    /// Claimed slot count per owner.
    pub claimants: BTreeMap<WorkerId, usize>,
}

impl StatusSummary {
    fn tally(bytes: &[u8], format: SlotFormat) -> Self {
        let mut summary = Self::default();
        for record in bytes.chunks_exact(format.one_size()) {
            match format.classify(record) {
                Some(SlotState::Free) => summary.free += 1,
                Some(SlotState::Done) => summary.done += 1,
                Some(SlotState::Claimed(owner)) => {
                    summary.claimed += 1;
                    *summary.claimants.entry(owner).or_default() += 1;
                }
                None => summary.invalid += 1,
            }
        }
        summary
    }

    /// Total number of slots.
    pub fn total(&self) -> usize {
        self.free + self.claimed + self.done + self.invalid
    }
}

/// Handle on the status table file.
#[derive(Debug)]
pub struct StatusTable {
    lock: LockFile,
    format: SlotFormat,
}

impl StatusTable {
    /// Open the table, creating an empty one if missing.
    pub fn open(path: impl AsRef<Path>, format: SlotFormat) -> Result<Self> {
        Ok(Self {
            lock: LockFile::open(path)?,
            format,
        })
    }

    pub fn path(&self) -> &Path {
        self.lock.path()
    }

    pub fn format(&self) -> SlotFormat {
        self.format
    }

    /// Take the exclusive lock (blocking) and map the table.
    pub fn view(&mut self) -> Result<StatusView<'_>> {
        let format = self.format;
        let guard = self.lock.guard(LockMode::Exclusive)?;
        StatusView::new(guard, format)
    }

    /// Like [`StatusTable::view`] but `None` when another process holds the lock.
    pub fn try_view(&mut self) -> Result<Option<StatusView<'_>>> {
        let format = self.format;
        match self.lock.try_guard(LockMode::Exclusive)? {
            Some(guard) => StatusView::new(guard, format).map(Some),
            None => Ok(None),
        }
    }

    /// Mark one position done under a fresh lock and map.
    pub fn mark_done(&mut self, position: usize) -> Result<()> {
        let mut view = self.view()?;
        view.mark_done(position)?;
        view.flush()
    }

    /// Tally slots under a shared lock with a read-only map.
    pub fn summary(&mut self) -> Result<StatusSummary> {
        let format = self.format;
        let guard = self.lock.guard(LockMode::Shared)?;
        if guard.is_empty()? {
            return Ok(StatusSummary::default());
        }

        let map = unsafe {
            Mmap::map(guard.file())
                .map_err(|e| QueueError::io("failed to map status table", guard.path(), e))?
        };
        Ok(StatusSummary::tally(&map, format))
    }
}

/// Mapped, exclusively locked view of the status table.
///
/// Grow, scan and claim calls made through one view see a consistent
/// snapshot: no other process can touch the table until the view drops.
#[derive(Debug)]
pub struct StatusView<'t> {
    // Declared before `guard` so the map is gone before the lock is released.
    map: Option<MmapMut>,
    guard: FileGuard<'t>,
    format: SlotFormat,
    slots: usize,
}

impl<'t> StatusView<'t> {
    fn new(guard: FileGuard<'t>, format: SlotFormat) -> Result<Self> {
        let mut view = Self {
            map: None,
            guard,
            format,
            slots: 0,
        };
        view.remap()?;
        Ok(view)
    }

    fn remap(&mut self) -> Result<()> {
        self.map = None;

        let len = self.guard.len()? as usize;
        let one_size = self.format.one_size();
        if len % one_size != 0 {
            return Err(QueueError::corrupt(
                self.guard.path(),
                format!("size {} is not a multiple of the slot size {}", len, one_size),
            ));
        }

        self.slots = len / one_size;
        if len > 0 {
            let map = unsafe {
                MmapMut::map_mut(self.guard.file()).map_err(|e| {
                    QueueError::io("failed to map status table", self.guard.path(), e)
                })?
            };
            self.map = Some(map);
        }
        Ok(())
    }

    fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    /// Value bytes of `position`, checked against the slot count.
    fn value_mut(&mut self, position: usize) -> Result<&mut [u8]> {
        let slots = self.slots;
        let one_size = self.format.one_size();
        match self.map.as_deref_mut() {
            Some(bytes) if position < slots => {
                let start = position * one_size;
                Ok(&mut bytes[start + 1..start + one_size])
            }
            _ => Err(QueueError::UserError(format!(
                "status table has no slot {} ({} slots)",
                position, slots
            ))),
        }
    }

    pub fn format(&self) -> SlotFormat {
        self.format
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots == 0
    }

    /// Append free slots until there are at least `n`. Returns how many
    /// were added; calling again with the same `n` changes nothing.
    pub fn grow_to(&mut self, n: usize) -> Result<usize> {
        if n <= self.slots {
            return Ok(0);
        }

        let added = n - self.slots;
        let buf = self.format.free_record().repeat(added);

        self.map = None;
        let path = self.guard.path().to_path_buf();
        self.guard
            .seek(SeekFrom::Start((self.slots * self.format.one_size()) as u64))
            .and_then(|_| self.guard.write_all(&buf))
            .map_err(|e| QueueError::io("failed to grow status table", &path, e))?;
        self.guard.force_flush()?;
        self.remap()?;

        tracing::debug!(slots = self.slots, added, "status table grown");
        Ok(added)
    }

    /// Scan slots of `kind` starting at slot `from`.
    pub fn scan(&self, kind: ScanKind, from: usize, limit: Option<usize>) -> SlotScan<'_> {
        SlotScan::new(self.bytes(), self.format, kind, from, limit)
    }

    pub fn scan_free(&self, limit: usize) -> SlotScan<'_> {
        self.scan(ScanKind::Free, 0, Some(limit))
    }

    pub fn scan_claimed(&self, limit: usize) -> SlotScan<'_> {
        self.scan(ScanKind::Claimed, 0, Some(limit))
    }

    pub fn scan_done(&self, limit: usize) -> SlotScan<'_> {
        self.scan(ScanKind::Done, 0, Some(limit))
    }

    /// State of one slot; `None` if out of range or malformed.
    pub fn state(&self, position: usize) -> Option<SlotState> {
        let one_size = self.format.one_size();
        let start = position.checked_mul(one_size)?;
        let record = self.bytes().get(start..start + one_size)?;
        self.format.classify(record)
    }

    /// Write `worker` into a free slot or one claimed by someone else.
    pub fn claim(&mut self, position: usize, worker: WorkerId) -> Result<()> {
        if worker.0 == 0 || worker.0 > self.format.max_worker_id() {
            return Err(QueueError::IdSpaceExhausted(worker.0));
        }
        if self.state(position) == Some(SlotState::Done) {
            return Err(QueueError::UserError(format!(
                "slot {} is already done and cannot be claimed",
                position
            )));
        }

        let encoded = self.format.encode_value(worker.0);
        self.value_mut(position)?.copy_from_slice(&encoded);
        Ok(())
    }

    /// Write the done sentinel into a slot.
    pub fn mark_done(&mut self, position: usize) -> Result<()> {
        self.value_mut(position)?.fill(DONE_BYTE);
        Ok(())
    }

    /// Reset one slot to free.
    pub fn release(&mut self, position: usize) -> Result<()> {
        self.value_mut(position)?.fill(FREE_BYTE);
        Ok(())
    }

    /// Reset every claimed slot to free. Returns how many were reset.
    pub fn release_claimed(&mut self) -> Result<usize> {
        let positions: Vec<usize> = self
            .scan(ScanKind::Claimed, 0, None)
            .map(|s| s.position)
            .collect();
        for &position in &positions {
            self.release(position)?;
        }
        Ok(positions.len())
    }

    pub fn summary(&self) -> StatusSummary {
        StatusSummary::tally(self.bytes(), self.format)
    }

    /// Flush mapped writes to the file.
    pub fn flush(&self) -> Result<()> {
        match &self.map {
            Some(map) => map
                .flush()
                .map_err(|e| QueueError::io("failed to flush status table", self.guard.path(), e)),
            None => Ok(()),
        }
    }
}
