//! Implementation of the `flockwork board` subcommands.

use crate::cli::{BoardNameArgs, BoardPushArgs};
use flockwork::context::WorkDir;
use flockwork::error::Result;
use flockwork::task::TaskRecord;
use flockwork::worker::TaskBoard;

fn open_board(work: &WorkDir, name: &str) -> Result<TaskBoard<TaskRecord>> {
    TaskBoard::open(work.boards_dir(), name, work.locks_dir())
}

/// Execute `flockwork board push`.
pub fn cmd_board_push(work: &WorkDir, args: BoardPushArgs) -> Result<()> {
    work.ensure_initialized()?;

    let records: Vec<TaskRecord> = args.commands.iter().map(TaskRecord::new).collect();
    let ids = open_board(work, &args.name)?.push(&records)?;

    tracing::info!(board = %args.name, pushed = ids.len(), "tasks pushed to board");
    println!("Pushed {} task(s) to board '{}'.", ids.len(), args.name);
    for (id, record) in ids.iter().zip(&records) {
        println!("  {:>6}  {}", id, record.command);
    }
    Ok(())
}

/// Execute `flockwork board list`.
pub fn cmd_board_list(work: &WorkDir, args: BoardNameArgs) -> Result<()> {
    work.ensure_initialized()?;

    let entries = open_board(work, &args.name)?.entries()?;
    if entries.is_empty() {
        println!("Board '{}' is empty.", args.name);
        return Ok(());
    }

    println!("Board '{}': {} task(s)", args.name, entries.len());
    println!("  {:>6}  {:>6}  COMMAND", "TASK", "OWNER");
    for (_, entry) in &entries {
        let owner = entry
            .owner
            .map_or_else(|| "-".to_string(), |owner| owner.to_string());
        println!("  {:>6}  {:>6}  {}", entry.task_id, owner, entry.payload.command);
    }
    Ok(())
}

/// Execute `flockwork board clear`.
pub fn cmd_board_clear(work: &WorkDir, args: BoardNameArgs) -> Result<()> {
    work.ensure_initialized()?;

    let mut board = open_board(work, &args.name)?;
    let dropped = board.len()?;
    board.clear()?;

    tracing::info!(board = %args.name, dropped, "board cleared");
    println!("Cleared {} task(s) from board '{}'.", dropped, args.name);
    Ok(())
}
