//! Binary task-status table.
//!
//! One fixed-width slot per task position. A slot is one separator byte
//! followed by `use_bytes` little-endian value bytes:
//!
//! | value                 | meaning                   |
//! |-----------------------|---------------------------|
//! | all `0x00`            | free                      |
//! | all `0xFF`            | done                      |
//! | anything else         | claimed by that worker id |
//!
//! Slots only move `free -> claimed -> done`, except that a slot claimed by
//! a dead worker may be re-claimed by a live one. The table grows lazily
//! (new slots are free) as the task list grows.
//!
//! All access goes through a memory map held only while the file's lock is
//! held ([`StatusView`] for exclusive work, [`StatusTable::summary`] for
//! shared reads).

mod format;
mod scan;
mod table;

#[cfg(test)]
mod tests;

pub use format::{DONE_BYTE, FREE_BYTE, SlotFormat, SlotState};
pub use scan::{ScanKind, SlotRange, SlotScan};
pub use table::{StatusSummary, StatusTable, StatusView};
