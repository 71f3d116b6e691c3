//! Fixed-width forward scans over mapped status bytes.
//!
//! A scan walks whole records from an aligned starting slot and compares
//! each against the pattern of the requested kind:
//!
//! - free: separator + all-zero value
//! - claimed: separator + value that is neither all-zero nor all-ones
//! - done: separator + all-ones value
//!
//! Records without the separator match nothing. A trailing partial record
//! is never visited.

use super::format::{DONE_BYTE, FREE_BYTE, SlotFormat};
use std::ops::Range;
use std::slice::ChunksExact;

/// Which slots a scan yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Free,
    Claimed,
    Done,
}

/// One matching slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRange {
    /// Task position (slot index).
    pub position: usize,
    /// Byte range of the whole record, separator included.
    pub bytes: Range<usize>,
}

impl SlotRange {
    /// Byte range of the value part only.
    pub fn value_bytes(&self) -> Range<usize> {
        self.bytes.start + 1..self.bytes.end
    }
}

/// Lazy scan over mapped bytes; see the module docs for the patterns.
#[derive(Debug)]
pub struct SlotScan<'m> {
    records: ChunksExact<'m, u8>,
    kind: ScanKind,
    separator: u8,
    one_size: usize,
    next_position: usize,
    remaining: Option<usize>,
}

impl<'m> SlotScan<'m> {
    /// Scan `bytes` from slot `from`, yielding at most `limit` matches.
    pub fn new(
        bytes: &'m [u8],
        format: SlotFormat,
        kind: ScanKind,
        from: usize,
        limit: Option<usize>,
    ) -> Self {
        let one_size = format.one_size();
        let start = from.saturating_mul(one_size).min(bytes.len());
        Self {
            records: bytes[start..].chunks_exact(one_size),
            kind,
            separator: format.separator(),
            one_size,
            next_position: from,
            remaining: limit,
        }
    }

    fn matches(&self, record: &[u8]) -> bool {
        if record[0] != self.separator {
            return false;
        }
        let value = &record[1..];
        match self.kind {
            ScanKind::Free => value.iter().all(|&b| b == FREE_BYTE),
            ScanKind::Done => value.iter().all(|&b| b == DONE_BYTE),
            ScanKind::Claimed => {
                value.iter().any(|&b| b != FREE_BYTE) && value.iter().any(|&b| b != DONE_BYTE)
            }
        }
    }
}

impl Iterator for SlotScan<'_> {
    type Item = SlotRange;

    fn next(&mut self) -> Option<SlotRange> {
        if self.remaining == Some(0) {
            return None;
        }

        while let Some(record) = self.records.next() {
            let position = self.next_position;
            self.next_position += 1;

            if self.matches(record) {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                let start = position * self.one_size;
                return Some(SlotRange {
                    position,
                    bytes: start..start + self.one_size,
                });
            }
        }

        None
    }
}
