//! Append-only record log.
//!
//! A record log is one file holding a sequence of independently serialized
//! records, one JSON document per line (NDJSON). Appends happen under an
//! exclusive lock and are synced before the lock is dropped; readers take a
//! shared lock and read until end-of-stream. No record is ever rewritten.
//!
//! A clean end-of-stream ends a read. Anything that does not parse,
//! including a torn final line, is reported as [`QueueError::Corrupt`].

use crate::error::{QueueError, Result};
use crate::lock::{FileGuard, LockFile, LockMode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::de::IoRead;
use std::fs::File;
use std::io::{self, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Create each file (and its parent directories) if missing. Existing
/// content is left alone.
pub fn ensure_exists<P: AsRef<Path>>(paths: &[P]) -> Result<()> {
    for path in paths {
        LockFile::open(path.as_ref())?;
    }
    Ok(())
}

/// Append `records` to the log at `path`, returning how many were written.
pub fn append<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<usize> {
    let mut lock = LockFile::open(path.as_ref())?;
    let mut guard = lock.guard(LockMode::Exclusive)?;
    append_locked(&mut guard, records)
}

/// Append through an already held exclusive guard.
///
/// Used when the append has to share a critical section with other work on
/// the same file.
pub fn append_locked<T: Serialize>(guard: &mut FileGuard<'_>, records: &[T]) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    let path = guard.path().to_path_buf();
    let mut buf = Vec::new();
    for record in records {
        serde_json::to_writer(&mut buf, record)
            .map_err(|e| QueueError::UserError(format!("failed to serialize record: {}", e)))?;
        buf.push(b'\n');
    }

    guard
        .seek(SeekFrom::End(0))
        .and_then(|_| guard.write_all(&buf))
        .map_err(|e| QueueError::io("failed to append to record log", &path, e))?;
    guard.force_flush()?;

    Ok(records.len())
}

/// Read every record in the log. A missing file reads as empty.
pub fn read_all<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let mut lock = match LockFile::open_read_only(path) {
        Ok(lock) => lock,
        Err(QueueError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut guard = lock.guard(LockMode::Shared)?;
    read_locked(&mut guard)
}

/// Read every record through an already held guard, from the start of the file.
pub fn read_locked<T: DeserializeOwned>(guard: &mut FileGuard<'_>) -> Result<Vec<T>> {
    let path = guard.path().to_path_buf();
    guard.rewind()?;

    serde_json::Deserializer::from_reader(BufReader::new(&mut *guard))
        .into_iter::<T>()
        .map(|record| record.map_err(|e| corrupt(&path, &e)))
        .collect()
}

/// Lazily iterate the log, holding a shared lock until the iterator is dropped.
///
/// The iterator is finite and cannot be restarted; call `iterate` again for
/// a fresh pass.
pub fn iterate<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<RecordIter<T>> {
    let path = path.as_ref();
    let mut lock = LockFile::open_read_only(path)?;
    lock.lock(LockMode::Shared, true)?;

    let mut file = lock.duplicate()?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| QueueError::io("failed to seek", path, e))?;

    Ok(RecordIter {
        stream: serde_json::Deserializer::from_reader(BufReader::new(file)).into_iter(),
        path: path.to_path_buf(),
        finished: false,
        _lock: lock,
    })
}

/// Iterator returned by [`iterate`].
pub struct RecordIter<T> {
    stream: serde_json::StreamDeserializer<'static, IoRead<BufReader<File>>, T>,
    path: PathBuf,
    finished: bool,
    _lock: LockFile,
}

impl<T: DeserializeOwned> Iterator for RecordIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.stream.next() {
            Some(Ok(record)) => Some(Ok(record)),
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(corrupt(&self.path, &e)))
            }
            None => {
                self.finished = true;
                None
            }
        }
    }
}

fn corrupt(path: &Path, err: &serde_json::Error) -> QueueError {
    QueueError::corrupt(
        path,
        format!("malformed record at line {} column {}: {}", err.line(), err.column(), err),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Entry {
        name: String,
        weight: u32,
    }

    fn entry(name: &str, weight: u32) -> Entry {
        Entry {
            name: name.to_string(),
            weight,
        }
    }

    #[test]
    fn test_ensure_exists_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("deep/dir/a.log");
        let b = temp.path().join("b.log");

        ensure_exists(&[&a, &b]).unwrap();
        std::fs::write(&b, "{}\n").unwrap();
        ensure_exists(&[&a, &b]).unwrap();

        assert!(a.exists());
        assert_eq!(std::fs::read_to_string(&b).unwrap(), "{}\n");
    }

    #[test]
    fn test_append_then_read_all_preserves_order() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("log");

        assert_eq!(append(&path, &[entry("a", 1), entry("b", 2)]).unwrap(), 2);
        assert_eq!(append(&path, &[entry("c", 3)]).unwrap(), 1);

        let records: Vec<Entry> = read_all(&path).unwrap();
        assert_eq!(records, vec![entry("a", 1), entry("b", 2), entry("c", 3)]);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 3);
    }

    #[test]
    fn test_append_nothing_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("log");

        assert_eq!(append::<Entry>(&path, &[]).unwrap(), 0);
        assert_eq!(std::fs::read(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_read_all_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let records: Vec<Entry> = read_all(temp.path().join("absent")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_malformed_record_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("log");
        append(&path, &[entry("a", 1)]).unwrap();

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"name\": \"torn\", \"wei").unwrap();

        let err = read_all::<Entry>(&path).unwrap_err();
        assert!(matches!(err, QueueError::Corrupt { .. }));
    }

    #[test]
    fn test_iterate_is_lazy_and_holds_shared_lock() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("log");
        append(&path, &[entry("a", 1), entry("b", 2)]).unwrap();

        let mut iter = iterate::<Entry>(&path).unwrap();
        assert_eq!(iter.next().unwrap().unwrap(), entry("a", 1));

        let mut writer = LockFile::open(&path).unwrap();
        assert!(!writer.try_lock(LockMode::Exclusive).unwrap());

        assert_eq!(iter.next().unwrap().unwrap(), entry("b", 2));
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());

        drop(iter);
        assert!(writer.try_lock(LockMode::Exclusive).unwrap());
    }

    #[test]
    fn test_iterate_stops_after_corruption() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("log");
        std::fs::write(&path, "{\"name\":\"a\",\"weight\":1}\nnot json\n").unwrap();

        let results: Vec<Result<Entry>> = iterate(&path).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(QueueError::Corrupt { .. })));
    }

    #[test]
    fn test_append_locked_shares_critical_section() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("log");
        let mut lock = LockFile::open(&path).unwrap();

        let mut guard = lock.guard(LockMode::Exclusive).unwrap();
        append_locked(&mut guard, &[entry("a", 1)]).unwrap();
        let seen: Vec<Entry> = read_locked(&mut guard).unwrap();
        append_locked(&mut guard, &[entry("b", 2)]).unwrap();
        drop(guard);

        assert_eq!(seen, vec![entry("a", 1)]);
        assert_eq!(read_all::<Entry>(&path).unwrap().len(), 2);
    }
}
