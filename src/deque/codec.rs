//! On-disk text format of a deque file.
//!
//! ```text
//! <next id>
//! <id> <base64(json payload)>
//! <id> <base64(json payload)>
//! ```
//!
//! Payloads stay encoded in memory and are only decoded when read, so a
//! rewrite never has to round-trip entries it did not touch.

use crate::error::{QueueError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// First id handed out by a fresh deque.
pub const FIRST_ID: u64 = 1;

/// One stored entry with its payload still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub id: u64,
    pub payload: String,
}

/// Parsed content of a deque file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub next_id: u64,
    pub entries: Vec<RawEntry>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            next_id: FIRST_ID,
            entries: Vec::new(),
        }
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value)
        .map_err(|e| QueueError::UserError(format!("failed to serialize payload: {}", e)))?;
    Ok(STANDARD.encode(json))
}

pub fn decode<T: DeserializeOwned>(path: &Path, entry: &RawEntry) -> Result<T> {
    let bytes = STANDARD.decode(entry.payload.as_bytes()).map_err(|e| {
        QueueError::corrupt(path, format!("entry {}: invalid base64: {}", entry.id, e))
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        QueueError::corrupt(path, format!("entry {}: invalid payload: {}", entry.id, e))
    })
}

/// Parse a whole deque file. An empty file is a fresh deque.
pub fn parse(path: &Path, text: &str) -> Result<Snapshot> {
    let mut lines = text.lines();

    let Some(header) = lines.next() else {
        return Ok(Snapshot::default());
    };

    let next_id: u64 = header.trim().parse().map_err(|_| {
        QueueError::corrupt(path, format!("invalid id counter line '{}'", header))
    })?;

    let mut entries = Vec::new();
    let mut last_id = None;

    for (lineno, line) in lines.enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (id, payload) = line
            .split_once(' ')
            .and_then(|(id, payload)| Some((id.parse::<u64>().ok()?, payload)))
            .ok_or_else(|| {
                QueueError::corrupt(path, format!("malformed entry on line {}", lineno + 2))
            })?;

        if last_id.is_some_and(|last| id <= last) || id >= next_id {
            return Err(QueueError::corrupt(
                path,
                format!("entry id {} out of order on line {}", id, lineno + 2),
            ));
        }
        last_id = Some(id);

        entries.push(RawEntry {
            id,
            payload: payload.to_string(),
        });
    }

    Ok(Snapshot { next_id, entries })
}

/// Render a snapshot back to file content.
pub fn render(snapshot: &Snapshot) -> String {
    let mut out = format!("{}\n", snapshot.next_id);
    for entry in &snapshot.entries {
        out.push_str(&entry.id.to_string());
        out.push(' ');
        out.push_str(&entry.payload);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_fresh_deque() {
        let snapshot = parse(Path::new("q.deq"), "").unwrap();
        assert_eq!(snapshot, Snapshot::default());
    }

    #[test]
    fn test_render_format() {
        let snapshot = Snapshot {
            next_id: 8,
            entries: vec![RawEntry {
                id: 7,
                payload: encode(&"job").unwrap(),
            }],
        };

        let text = render(&snapshot);
        assert_eq!(text, "8\n7 ImpvYiI=\n");
        assert_eq!(parse(Path::new("q.deq"), &text).unwrap(), snapshot);
    }

    #[test]
    fn test_encoded_payload_is_line_safe() {
        let encoded = encode(&"line one\nline two with spaces").unwrap();
        assert!(!encoded.contains(' '));
        assert!(!encoded.contains('\n'));
    }

    #[test]
    fn test_bad_header_is_corrupt() {
        let err = parse(Path::new("q.deq"), "abc\n").unwrap_err();
        assert!(matches!(err, QueueError::Corrupt { .. }));
    }

    #[test]
    fn test_out_of_order_ids_are_corrupt() {
        let err = parse(Path::new("q.deq"), "5\n3 e30=\n2 e30=\n").unwrap_err();
        assert!(matches!(err, QueueError::Corrupt { .. }));

        let err = parse(Path::new("q.deq"), "3\n3 e30=\n").unwrap_err();
        assert!(matches!(err, QueueError::Corrupt { .. }));
    }

    #[test]
    fn test_bad_payload_is_corrupt_on_decode() {
        let snapshot = parse(Path::new("q.deq"), "2\n1 !!!\n").unwrap();
        let err = decode::<String>(Path::new("q.deq"), &snapshot.entries[0]).unwrap_err();
        assert!(matches!(err, QueueError::Corrupt { .. }));
    }
}
