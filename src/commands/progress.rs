//! Implementation of the `flockwork progress` command.
//!
//! Without `--report` this becomes the work directory's progress reporter
//! and publishes a snapshot every refresh interval until interrupted. With
//! `--report` it prints the latest snapshot once; if no reporter has
//! published yet, it observes the status table directly.

use crate::cli::ProgressArgs;
use flockwork::context::WorkDir;
use flockwork::error::{QueueError, Result};
use flockwork::progress::{self, ProgressReporter, ProgressSnapshot};
use flockwork::signals;
use flockwork::status::StatusTable;
use flockwork::worker::StopHandle;
use std::time::Duration;

/// Execute the `flockwork progress` command.
pub fn cmd_progress(work: &WorkDir, args: ProgressArgs) -> Result<()> {
    work.ensure_initialized()?;

    if args.report {
        println!("{}", report_line(work)?);
        return Ok(());
    }

    let refresh = args
        .refresh_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| work.config.progress_refresh());

    let mut reporter = ProgressReporter::open(work).map_err(|e| match e {
        QueueError::WouldBlock(_) => QueueError::UserError(format!(
            "a progress reporter is already running for '{}'",
            work.root.display()
        )),
        other => other,
    })?;

    signals::install()?;
    reporter.run(refresh, &StopHandle::with_signals())
}

/// Latest published snapshot, or a fresh observation when there is none.
pub(crate) fn report_line(work: &WorkDir) -> Result<String> {
    let now = progress::now_secs();
    let snapshot = match progress::read_snapshot(&work.progress_path())? {
        Some(snapshot) => snapshot,
        None => {
            let mut table = StatusTable::open(work.status_path(), work.format)?;
            let (count, total) = progress::observe(&mut table)?;
            ProgressSnapshot {
                count,
                total,
                baseline_count: count,
                baseline_time: now,
            }
        }
    };
    Ok(snapshot.report_line(now))
}
