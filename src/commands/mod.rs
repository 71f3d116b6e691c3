//! Command implementations for flockwork.
//!
//! This module resolves the work directory, sets up logging from its
//! config, and routes each CLI command to its implementation. Commands take
//! the resolved [`WorkDir`] so they can be exercised directly in tests.

mod add;
mod board;
mod clear;
mod init;
mod progress;
mod release;
mod status;
mod work;


use crate::cli::{BoardAction, Cli, Command};
use flockwork::context::WorkDir;
use flockwork::error::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Dispatch a command to its implementation.
pub fn dispatch(cli: Cli) -> Result<()> {
    let work = match &cli.dir {
        Some(dir) => WorkDir::resolve_from(dir)?,
        None => WorkDir::resolve()?,
    };
    init_logging(&work.config.log_level);

    match cli.command {
        Command::Init(args) => init::cmd_init(&work, args),
        Command::Add(args) => add::cmd_add(&work, args),
        Command::Work(args) => work::cmd_work(&work, args),
        Command::Status => status::cmd_status(&work),
        Command::Progress(args) => progress::cmd_progress(&work, args),
        Command::Release(args) => release::cmd_release(&work, args),
        Command::Clear(args) => clear::cmd_clear(&work, args),
        Command::Board(board_cmd) => match board_cmd.action {
            BoardAction::Push(args) => board::cmd_board_push(&work, args),
            BoardAction::List(args) => board::cmd_board_list(&work, args),
            BoardAction::Clear(args) => board::cmd_board_clear(&work, args),
        },
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
