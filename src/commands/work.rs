//! Implementation of the `flockwork work` command.
//!
//! Runs one worker until the queue is exhausted. Each task's command is
//! split with shell quoting rules and executed directly, without a shell.
//! SIGINT and SIGTERM stop the worker between tasks; the current task's
//! slot stays claimed and is stolen by the next worker once this one exits.

use crate::cli::WorkArgs;
use anyhow::{Context, anyhow, bail};
use flockwork::context::WorkDir;
use flockwork::error::{QueueError, Result, TaskError};
use flockwork::signals;
use flockwork::task::TaskRecord;
use flockwork::worker::{
    ClaimedTask, Coordinator, NoHooks, RunSummary, StatusSource, StopHandle, TaskBoard,
};
use std::fmt::Display;
use std::process::Command;
use std::time::Duration;

/// Execute the `flockwork work` command.
pub fn cmd_work(work: &WorkDir, args: WorkArgs) -> Result<()> {
    work.ensure_initialized()?;
    signals::install()?;

    let mut coordinator = Coordinator::start(work)?.with_stop_handle(StopHandle::with_signals());
    if let Some(tasks) = args.tasks {
        coordinator = coordinator.with_batch_size(tasks);
    }
    if let Some(wait_ms) = args.wait_ms {
        coordinator = coordinator.with_backoff(Duration::from_millis(wait_ms));
    }

    let summary = match &args.board {
        Some(name) => {
            let mut board: TaskBoard<TaskRecord> =
                TaskBoard::open(work.boards_dir(), name, work.locks_dir())?;
            coordinator.run(&mut board, &mut NoHooks, |task| execute(task))
        }
        None => {
            let mut source: StatusSource<TaskRecord> = StatusSource::open(work)?;
            coordinator.run(&mut source, &mut NoHooks, |task| execute(task))
        }
    }
    .map_err(|err| interrupted_failure(err, signals::interrupted()))?;

    print_summary(&coordinator, &summary);
    Ok(())
}

fn execute<K: Display>(task: &ClaimedTask<K, TaskRecord>) -> std::result::Result<(), TaskError> {
    if let Some(owner) = task.stolen_from {
        println!("[{}] {} (from worker {})", task.key, task.payload.command, owner);
    } else {
        println!("[{}] {}", task.key, task.payload.command);
    }
    run_command(&task.payload.command).map_err(Into::into)
}

/// The child shares our process group, so a Ctrl-C also kills it. A task
/// that failed after a signal arrived is reported as an interruption.
fn interrupted_failure(err: QueueError, interrupted: bool) -> QueueError {
    match err {
        QueueError::TaskFailed { task, .. } if interrupted => {
            tracing::warn!(%task, "task stopped by signal");
            QueueError::Interrupted
        }
        other => other,
    }
}

/// Run `command` without a shell; a non-zero exit is an error.
pub(crate) fn run_command(command: &str) -> anyhow::Result<()> {
    let words = shell_words::split(command)
        .with_context(|| format!("failed to parse command '{}'", command))?;
    let (program, args) = words
        .split_first()
        .ok_or_else(|| anyhow!("task command is empty"))?;

    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("failed to start '{}'", program))?;

    if !status.success() {
        bail!("'{}' exited with {}", command, status);
    }
    Ok(())
}

fn print_summary(coordinator: &Coordinator, summary: &RunSummary) {
    println!();
    println!(
        "Worker {} finished: {} task(s) completed, {} stolen, {} wait(s).",
        coordinator.id(),
        summary.completed,
        summary.stolen,
        summary.waits
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command_success() {
        run_command("true").unwrap();
    }

    #[test]
    fn test_run_command_failure_names_command() {
        let err = run_command("false").unwrap_err();
        assert!(err.to_string().contains("'false' exited with"));
    }

    #[test]
    fn test_run_command_respects_quoting() {
        run_command("test 'a b' = \"a b\"").unwrap();
    }

    #[test]
    fn test_run_command_rejects_empty_and_unbalanced() {
        assert!(run_command("   ").is_err());
        assert!(run_command("echo 'unterminated").is_err());
    }

    #[test]
    fn test_failure_after_signal_is_interruption() {
        let failed = || QueueError::TaskFailed {
            task: "3".to_string(),
            source: run_command("false").unwrap_err().into(),
        };

        assert!(matches!(
            interrupted_failure(failed(), true),
            QueueError::Interrupted
        ));
        assert!(matches!(
            interrupted_failure(failed(), false),
            QueueError::TaskFailed { .. }
        ));
        assert!(matches!(
            interrupted_failure(QueueError::MissingTask(1), true),
            QueueError::MissingTask(1)
        ));
    }

    #[test]
    fn test_run_command_missing_program() {
        let err = run_command("flockwork-no-such-program-xyz").unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }
}
