//! Implementation of the `flockwork add` command.

use crate::cli::AddArgs;
use flockwork::context::WorkDir;
use flockwork::error::{QueueError, Result};
use flockwork::events::{self, Event, EventAction};
use flockwork::task::add_tasks;
use serde_json::json;
use std::fs;
use std::path::Path;

/// Execute the `flockwork add` command.
pub fn cmd_add(work: &WorkDir, args: AddArgs) -> Result<()> {
    work.ensure_initialized()?;

    let mut commands = args.commands;
    if let Some(file) = &args.file {
        commands.extend(read_command_file(file)?);
    }
    if commands.is_empty() {
        return Err(QueueError::UserError(
            "no commands given; pass them as arguments or with --file".to_string(),
        ));
    }

    let outcome = add_tasks(work, &commands)?;

    events::record(
        work,
        Event::new(EventAction::Add).with_details(json!({
            "added": outcome.added.len(),
            "skipped": outcome.skipped.len(),
            "total": outcome.total,
        })),
    );

    println!(
        "Added {} task(s), skipped {} duplicate(s); {} task(s) in the list.",
        outcome.added.len(),
        outcome.skipped.len(),
        outcome.total
    );
    for command in &outcome.skipped {
        println!("  skipped: {}", command);
    }

    Ok(())
}

/// One command per non-blank line; lines starting with `#` are comments.
fn read_command_file(path: &Path) -> Result<Vec<String>> {
    let content =
        fs::read_to_string(path).map_err(|e| QueueError::io("failed to read command file", path, e))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}
