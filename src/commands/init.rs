//! Implementation of the `flockwork init` command.
//!
//! # What `flockwork init` does
//!
//! 1. Writes `flockwork.yaml` with defaults and any CLI overrides (if missing)
//! 2. Creates the task list, status table, id counter and event journal
//! 3. Creates the locks directory
//!
//! Running it on an initialized directory leaves existing files alone.

use crate::cli::InitArgs;
use flockwork::config::Config;
use flockwork::context::WorkDir;
use flockwork::error::{QueueError, Result};
use flockwork::fs::atomic_write_file;
use flockwork::record_log;
use std::fs;

/// Execute the `flockwork init` command.
pub fn cmd_init(work: &WorkDir, args: InitArgs) -> Result<()> {
    let work = if work.is_initialized() {
        if args.num_tasks.is_some() || args.use_bytes.is_some() {
            println!(
                "Config already exists at {}; edit it to change settings.",
                work.config_path().display()
            );
        }
        work.clone()
    } else {
        let mut config = Config::default();
        if let Some(num_tasks) = args.num_tasks {
            config.num_tasks = num_tasks;
        }
        if let Some(use_bytes) = args.use_bytes {
            config.use_bytes = use_bytes;
        }

        let work = WorkDir::with_config(&work.root, config)?;
        atomic_write_file(work.config_path(), &work.config.to_yaml()?)?;
        work
    };

    record_log::ensure_exists(&[
        work.queue_path(),
        work.status_path(),
        work.id_path(),
        work.events_path(),
    ])?;

    let locks_dir = work.locks_dir();
    fs::create_dir_all(&locks_dir)
        .map_err(|e| QueueError::io("failed to create locks directory", &locks_dir, e))?;

    tracing::info!(root = %work.root.display(), "work directory initialized");

    println!("Initialized flockwork work directory.");
    println!();
    println!("Work directory: {}", work.root.display());
    println!(
        "Slot width:     {} value byte(s), up to {} workers",
        work.format.use_bytes(),
        work.format.max_worker_id()
    );
    println!("Batch size:     {}", work.config.num_tasks);
    println!();
    println!("You can now add tasks with `flockwork add \"<command>\"`.");

    Ok(())
}
