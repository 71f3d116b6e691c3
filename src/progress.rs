//! Progress reporting.
//!
//! A reporter polls the status table and publishes a 32-byte snapshot
//! (`count`, `total`, `baseline_count` as little-endian u64, then
//! `baseline_time` as a little-endian f64 of seconds since the epoch).
//! Only one reporter may run per work directory: it holds the snapshot
//! file's exclusive lock, taken without waiting, for its whole run.
//!
//! Readers do not lock the snapshot. The reporter overwrites it in place
//! with a single fixed-size write, so a reader sees either nothing or a
//! whole record.

use crate::context::WorkDir;
use crate::error::{QueueError, Result};
use crate::lock::{LockFile, LockMode};
use crate::status::StatusTable;
use crate::worker::StopHandle;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Size of an encoded [`ProgressSnapshot`].
pub const SNAPSHOT_SIZE: usize = 32;

/// One published observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Done slots.
    pub count: u64,
    /// All slots.
    pub total: u64,
    /// `count` at the reporter's first observation.
    pub baseline_count: u64,
    /// When the first observation was made (seconds since the epoch).
    pub baseline_time: f64,
}

impl ProgressSnapshot {
    pub fn encode(&self) -> [u8; SNAPSHOT_SIZE] {
        let mut buf = [0u8; SNAPSHOT_SIZE];
        buf[0..8].copy_from_slice(&self.count.to_le_bytes());
        buf[8..16].copy_from_slice(&self.total.to_le_bytes());
        buf[16..24].copy_from_slice(&self.baseline_count.to_le_bytes());
        buf[24..32].copy_from_slice(&self.baseline_time.to_le_bytes());
        buf
    }

    pub fn decode(path: &Path, bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; SNAPSHOT_SIZE] = bytes.try_into().map_err(|_| {
            QueueError::corrupt(
                path,
                format!("snapshot is {} bytes, expected {}", bytes.len(), SNAPSHOT_SIZE),
            )
        })?;

        let word = |i: usize| {
            let mut w = [0u8; 8];
            w.copy_from_slice(&bytes[i * 8..(i + 1) * 8]);
            w
        };
        Ok(Self {
            count: u64::from_le_bytes(word(0)),
            total: u64::from_le_bytes(word(1)),
            baseline_count: u64::from_le_bytes(word(2)),
            baseline_time: f64::from_le_bytes(word(3)),
        })
    }

    /// Done share in percent; 0 for an empty table.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.count as f64 / self.total as f64
    }

    /// Completions per second since the baseline.
    pub fn rate(&self, now: f64) -> f64 {
        let elapsed = now - self.baseline_time;
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.count.saturating_sub(self.baseline_count) as f64 / elapsed
    }

    /// Seconds until done at the current rate, if anything is moving.
    pub fn eta(&self, now: f64) -> Option<f64> {
        let rate = self.rate(now);
        (rate > 0.0).then(|| self.total.saturating_sub(self.count) as f64 / rate)
    }

    /// `"<count> / <total> = <pct>% (<rate> / s) ETA: <eta>"`.
    pub fn report_line(&self, now: f64) -> String {
        let eta = self.eta(now).map_or_else(|| "-".to_string(), sec_to_str);
        format!(
            "{} / {} = {:.2}% ({:.2} / s) ETA: {}",
            self.count,
            self.total,
            self.percentage(),
            self.rate(now),
            eta
        )
    }
}

/// Format a duration in seconds as `[D-][HH:][MM:]SS.sssss`.
///
/// Leading fields appear only once they are nonzero (or a larger one is).
pub fn sec_to_str(sec: f64) -> String {
    let days = (sec / 86_400.0).floor();
    let sec = sec - days * 86_400.0;
    let hours = (sec / 3_600.0).floor();
    let sec = sec - hours * 3_600.0;
    let minutes = (sec / 60.0).floor();
    let sec = sec - minutes * 60.0;

    let mut result = format!("{:08.5}", sec);
    if minutes > 0.0 || hours > 0.0 || days > 0.0 {
        result = format!("{:02.0}:{}", minutes, result);
        if hours > 0.0 || days > 0.0 {
            result = format!("{:02.0}:{}", hours, result);
            if days > 0.0 {
                result = format!("{:.0}-{}", days, result);
            }
        }
    }
    result
}

/// Seconds since the epoch, as the snapshot stores them.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

/// Read the published snapshot, if a reporter has written one.
pub fn read_snapshot(path: &Path) -> Result<Option<ProgressSnapshot>> {
    match std::fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Ok(None),
        Ok(bytes) => ProgressSnapshot::decode(path, &bytes).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(QueueError::io("failed to read progress snapshot", path, e)),
    }
}

/// Count done and total slots in the status table.
pub fn observe(table: &mut StatusTable) -> Result<(u64, u64)> {
    let summary = table.summary()?;
    Ok((summary.done as u64, summary.total() as u64))
}

/// The single running reporter of a work directory.
#[derive(Debug)]
pub struct ProgressReporter {
    snapshot: LockFile,
    table: StatusTable,
    baseline: Option<(u64, f64)>,
}

impl ProgressReporter {
    /// Take the snapshot lock without waiting.
    ///
    /// Fails with `WouldBlock` while another reporter is running.
    pub fn open(work: &WorkDir) -> Result<Self> {
        let mut snapshot = LockFile::open(work.progress_path())?;
        snapshot.lock_once(LockMode::Exclusive, false)?;

        Ok(Self {
            snapshot,
            table: StatusTable::open(work.status_path(), work.format)?,
            baseline: None,
        })
    }

    /// Observe the table once and publish the result.
    pub fn tick(&mut self) -> Result<ProgressSnapshot> {
        let (count, total) = observe(&mut self.table)?;
        let (baseline_count, baseline_time) = *self.baseline.get_or_insert((count, now_secs()));
        let snapshot = ProgressSnapshot {
            count,
            total,
            baseline_count,
            baseline_time,
        };

        let mut guard = self.snapshot.guard(LockMode::Exclusive)?;
        guard.rewind()?;
        let path = guard.path().to_path_buf();
        guard
            .write_all(&snapshot.encode())
            .map_err(|e| QueueError::io("failed to write progress snapshot", &path, e))?;
        guard.force_flush()?;

        tracing::debug!(count, total, "progress published");
        Ok(snapshot)
    }

    /// Publish every `refresh` until stopped.
    pub fn run(&mut self, refresh: Duration, stop: &StopHandle) -> Result<()> {
        while !stop.is_stopped() {
            let snapshot = self.tick()?;
            tracing::info!("{}", snapshot.report_line(now_secs()));
            stop.sleep(refresh);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::task::add_tasks;
    use tempfile::TempDir;

    fn work_dir(temp: &TempDir, tasks: usize) -> WorkDir {
        let work = WorkDir::with_config(temp.path(), Config::default()).unwrap();
        let commands: Vec<String> = (0..tasks).map(|i| format!("echo {}", i)).collect();
        add_tasks(&work, &commands).unwrap();
        work
    }

    #[test]
    fn test_sec_to_str() {
        assert_eq!(sec_to_str(5.5), "05.50000");
        assert_eq!(sec_to_str(65.25), "01:05.25000");
        assert_eq!(sec_to_str(3_661.0), "01:01:01.00000");
        assert_eq!(sec_to_str(90_061.5), "1-01:01:01.50000");
        assert_eq!(sec_to_str(86_400.0), "1-00:00:00.00000");
    }

    #[test]
    fn test_snapshot_layout() {
        let snapshot = ProgressSnapshot {
            count: 3,
            total: 10,
            baseline_count: 1,
            baseline_time: 2.5,
        };

        let bytes = snapshot.encode();

        assert_eq!(&bytes[0..8], &[3, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[8..16], &[10, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[24..32], &2.5f64.to_le_bytes());
        assert_eq!(
            ProgressSnapshot::decode(Path::new("p"), &bytes).unwrap(),
            snapshot
        );
    }

    #[test]
    fn test_short_snapshot_is_corrupt() {
        let err = ProgressSnapshot::decode(Path::new("p"), &[0; 7]).unwrap_err();
        assert!(matches!(err, QueueError::Corrupt { .. }));
    }

    #[test]
    fn test_report_line() {
        let snapshot = ProgressSnapshot {
            count: 30,
            total: 120,
            baseline_count: 10,
            baseline_time: 100.0,
        };

        // 20 done in 10 s: 2 / s, 90 left: 45 s.
        assert_eq!(
            snapshot.report_line(110.0),
            "30 / 120 = 25.00% (2.00 / s) ETA: 45.00000"
        );
    }

    #[test]
    fn test_report_line_without_movement() {
        let snapshot = ProgressSnapshot {
            count: 0,
            total: 0,
            baseline_count: 0,
            baseline_time: 100.0,
        };

        assert_eq!(
            snapshot.report_line(100.0),
            "0 / 0 = 0.00% (0.00 / s) ETA: -"
        );
    }

    #[test]
    fn test_reporter_publishes_snapshot() {
        let temp = TempDir::new().unwrap();
        let work = work_dir(&temp, 4);
        StatusTable::open(work.status_path(), work.format)
            .unwrap()
            .mark_done(2)
            .unwrap();

        let mut reporter = ProgressReporter::open(&work).unwrap();
        let first = reporter.tick().unwrap();
        assert_eq!((first.count, first.total, first.baseline_count), (1, 4, 1));

        StatusTable::open(work.status_path(), work.format)
            .unwrap()
            .mark_done(0)
            .unwrap();
        let second = reporter.tick().unwrap();

        assert_eq!(second.count, 2);
        assert_eq!(second.baseline_count, 1);
        assert_eq!(second.baseline_time, first.baseline_time);
        assert_eq!(read_snapshot(&work.progress_path()).unwrap(), Some(second));
    }

    #[test]
    fn test_single_reporter_per_work_dir() {
        let temp = TempDir::new().unwrap();
        let work = work_dir(&temp, 1);
        let _running = ProgressReporter::open(&work).unwrap();

        let err = ProgressReporter::open(&work).unwrap_err();

        assert!(matches!(err, QueueError::WouldBlock(_)));
    }

    #[test]
    fn test_missing_snapshot_reads_none() {
        let temp = TempDir::new().unwrap();
        assert_eq!(read_snapshot(&temp.path().join("progress.bin")).unwrap(), None);
    }

    #[test]
    fn test_run_stops_on_handle() {
        let temp = TempDir::new().unwrap();
        let work = work_dir(&temp, 2);
        let mut reporter = ProgressReporter::open(&work).unwrap();
        let stop = StopHandle::new();
        stop.stop();

        reporter.run(Duration::from_millis(10), &stop).unwrap();

        assert_eq!(read_snapshot(&work.progress_path()).unwrap(), None);
    }
}
