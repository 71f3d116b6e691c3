//! Byte layout of one status-table slot.

use crate::error::{QueueError, Result};
use crate::identity::WorkerId;

/// Fill byte of a free slot's value.
pub const FREE_BYTE: u8 = 0x00;

/// Fill byte of a done slot's value.
pub const DONE_BYTE: u8 = 0xFF;

/// Validated slot layout: one separator byte followed by `use_bytes`
/// little-endian value bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotFormat {
    use_bytes: usize,
    separator: u8,
}

/// Decoded state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    Claimed(WorkerId),
    Done,
}

impl SlotFormat {
    pub const MAX_USE_BYTES: usize = 8;

    pub fn new(use_bytes: usize, separator: u8) -> Result<Self> {
        if !(1..=Self::MAX_USE_BYTES).contains(&use_bytes) {
            return Err(QueueError::Config(format!(
                "use_bytes must be between 1 and {} (got {})",
                Self::MAX_USE_BYTES,
                use_bytes
            )));
        }
        if separator == FREE_BYTE || separator == DONE_BYTE {
            return Err(QueueError::Config(format!(
                "separator must differ from 0x{:02X} and 0x{:02X} (got 0x{:02X})",
                FREE_BYTE, DONE_BYTE, separator
            )));
        }

        Ok(Self {
            use_bytes,
            separator,
        })
    }

    pub fn use_bytes(&self) -> usize {
        self.use_bytes
    }

    pub fn separator(&self) -> u8 {
        self.separator
    }

    /// Size of one slot in bytes.
    pub fn one_size(&self) -> usize {
        1 + self.use_bytes
    }

    /// Largest worker id that can be stored without colliding with the
    /// done sentinel.
    pub fn max_worker_id(&self) -> u64 {
        if self.use_bytes == Self::MAX_USE_BYTES {
            u64::MAX - 1
        } else {
            (1u64 << (8 * self.use_bytes)) - 2
        }
    }

    /// Encode `value` into exactly `use_bytes` little-endian bytes.
    pub fn encode_value(&self, value: u64) -> Vec<u8> {
        value.to_le_bytes()[..self.use_bytes].to_vec()
    }

    /// Decode up to `use_bytes` little-endian bytes.
    pub fn decode_value(&self, bytes: &[u8]) -> u64 {
        let mut buf = [0u8; 8];
        let n = bytes.len().min(self.use_bytes);
        buf[..n].copy_from_slice(&bytes[..n]);
        u64::from_le_bytes(buf)
    }

    /// A full free record (separator plus zero value).
    pub fn free_record(&self) -> Vec<u8> {
        let mut record = vec![FREE_BYTE; self.one_size()];
        record[0] = self.separator;
        record
    }

    /// Classify one `one_size` record. `None` when the separator is missing.
    pub fn classify(&self, record: &[u8]) -> Option<SlotState> {
        let (&sep, value) = record.split_first()?;
        if sep != self.separator || value.len() != self.use_bytes {
            return None;
        }

        if value.iter().all(|&b| b == FREE_BYTE) {
            Some(SlotState::Free)
        } else if value.iter().all(|&b| b == DONE_BYTE) {
            Some(SlotState::Done)
        } else {
            Some(SlotState::Claimed(WorkerId(self.decode_value(value))))
        }
    }
}

impl Default for SlotFormat {
    fn default() -> Self {
        Self {
            use_bytes: 2,
            separator: 0xAA,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_size() {
        assert_eq!(SlotFormat::default().one_size(), 3);
        assert_eq!(SlotFormat::new(4, 0x7E).unwrap().one_size(), 5);
    }

    #[test]
    fn test_invalid_formats_rejected() {
        assert!(SlotFormat::new(0, 0xAA).is_err());
        assert!(SlotFormat::new(9, 0xAA).is_err());
        assert!(SlotFormat::new(2, 0x00).is_err());
        assert!(SlotFormat::new(2, 0xFF).is_err());
    }

    #[test]
    fn test_classify_byte_records() {
        let format = SlotFormat::default();

        assert_eq!(format.classify(b"\xAA\x00\x00"), Some(SlotState::Free));
        assert_eq!(format.classify(b"\xAA\xFF\xFF"), Some(SlotState::Done));
        // Little-endian value bytes.
        assert_eq!(
            format.classify(b"\xAA\x05\x00"),
            Some(SlotState::Claimed(WorkerId(5)))
        );
        assert_eq!(
            format.classify(b"\xAA\x00\x05"),
            Some(SlotState::Claimed(WorkerId(1280)))
        );
        assert_eq!(
            format.classify(b"\xAA\xFF\x00"),
            Some(SlotState::Claimed(WorkerId(255)))
        );
        assert_eq!(format.classify(b"\xAB\x00\x00"), None);
        assert_eq!(format.classify(b"\xAA\x00"), None);
    }

    #[test]
    fn test_value_encoding_is_little_endian() {
        let format = SlotFormat::default();
        assert_eq!(format.encode_value(5), vec![0x05, 0x00]);
        assert_eq!(format.encode_value(0x0102), vec![0x02, 0x01]);
        assert_eq!(format.decode_value(&[0x02, 0x01]), 0x0102);
    }

    #[test]
    fn test_max_worker_id_avoids_done_sentinel() {
        assert_eq!(SlotFormat::new(1, 0xAA).unwrap().max_worker_id(), 0xFE);
        assert_eq!(SlotFormat::default().max_worker_id(), 0xFFFE);
        assert_eq!(SlotFormat::new(8, 0xAA).unwrap().max_worker_id(), u64::MAX - 1);
    }

    #[test]
    fn test_free_record() {
        assert_eq!(SlotFormat::default().free_record(), vec![0xAA, 0x00, 0x00]);
    }
}
