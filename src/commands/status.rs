//! Implementation of the `flockwork status` command.
//!
//! Displays slot counts of the status table and every worker that holds
//! claimed slots, with the result of probing its lock file.

use flockwork::context::WorkDir;
use flockwork::error::Result;
use flockwork::identity::{Liveness, probe_liveness};
use flockwork::status::StatusTable;
use flockwork::task::read_tasks;

/// Execute the `flockwork status` command.
pub fn cmd_status(work: &WorkDir) -> Result<()> {
    work.ensure_initialized()?;

    let summary = StatusTable::open(work.status_path(), work.format)?.summary()?;
    let tasks = read_tasks(work)?;

    println!("Work Status");
    println!("===========");
    println!();
    println!("Slots:");
    println!("  {:8} {:>6}", "free", summary.free);
    println!("  {:8} {:>6}", "claimed", summary.claimed);
    println!("  {:8} {:>6}", "done", summary.done);
    if summary.invalid > 0 {
        println!("  {:8} {:>6}", "invalid", summary.invalid);
    }
    println!("  --------");
    println!("  {:8} {:>6}", "total", summary.total());
    println!();
    println!("Task list: {} task(s)", tasks.len());

    if summary.total() < tasks.len() {
        println!(
            "  {} task(s) not yet in the status table (a worker or `add` will grow it)",
            tasks.len() - summary.total()
        );
    }

    if summary.claimants.is_empty() {
        println!();
        println!("No claimed tasks.");
        return Ok(());
    }

    println!();
    println!("Claimants:");
    let mut dead = 0;
    for (&worker, &count) in &summary.claimants {
        let liveness = probe_liveness(&work.worker_lock_path(worker))?;
        let marker = match liveness {
            Liveness::Alive => "alive",
            Liveness::Dead => {
                dead += 1;
                "dead"
            }
        };
        println!("  worker {:>6}: {:>6} slot(s) [{}]", worker, count, marker);
    }

    if dead > 0 {
        println!();
        println!(
            "{} dead worker(s) hold claimed slots; running workers will steal them, \
             or run `flockwork release` to free them.",
            dead
        );
    }

    Ok(())
}
