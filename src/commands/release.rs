//! Implementation of the `flockwork release` command.
//!
//! Operator recovery: resets claimed slots to free so any worker can claim
//! them again. By default only slots of dead workers are released; with
//! `--force` every claimed slot is.

use crate::cli::ReleaseArgs;
use flockwork::context::WorkDir;
use flockwork::error::Result;
use flockwork::events::{self, Event, EventAction};
use flockwork::identity::{Liveness, WorkerId, probe_liveness};
use flockwork::status::{ScanKind, SlotState, StatusTable};
use serde_json::json;
use std::collections::HashMap;

/// Execute the `flockwork release` command.
pub fn cmd_release(work: &WorkDir, args: ReleaseArgs) -> Result<()> {
    work.ensure_initialized()?;

    let released = release(work, args.force)?;

    events::record(
        work,
        Event::new(EventAction::Release)
            .with_details(json!({ "released": released, "force": args.force })),
    );
    tracing::info!(released, force = args.force, "claimed slots released");

    println!("Released {} claimed slot(s).", released);
    Ok(())
}

/// Reset claimed slots to free under the status table lock.
pub(crate) fn release(work: &WorkDir, force: bool) -> Result<usize> {
    let mut table = StatusTable::open(work.status_path(), work.format)?;
    let mut view = table.view()?;

    let released = if force {
        view.release_claimed()?
    } else {
        let claimed: Vec<(usize, WorkerId)> = view
            .scan(ScanKind::Claimed, 0, None)
            .filter_map(|slot| match view.state(slot.position) {
                Some(SlotState::Claimed(owner)) => Some((slot.position, owner)),
                _ => None,
            })
            .collect();

        let mut liveness: HashMap<WorkerId, Liveness> = HashMap::new();
        let mut released = 0;
        for (position, owner) in claimed {
            let state = match liveness.get(&owner) {
                Some(&state) => state,
                None => {
                    let state = probe_liveness(&work.worker_lock_path(owner))?;
                    liveness.insert(owner, state);
                    state
                }
            };
            if state == Liveness::Dead {
                view.release(position)?;
                released += 1;
            }
        }
        released
    };

    view.flush()?;
    Ok(released)
}
