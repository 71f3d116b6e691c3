//! CLI argument parsing for flockwork.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Flockwork: crash-tolerant work queue shared by independent worker processes.
///
/// A work directory holds a task list, a binary status table and one lock
/// file per running worker. Workers coordinate only through file locks, so
/// any number of them may run against the same directory, and work left by
/// a crashed worker is picked up by the others.
#[derive(Parser, Debug)]
#[command(name = "flockwork")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Work directory (defaults to the current directory).
    #[arg(short = 'C', long = "dir", global = true, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for flockwork.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a work directory.
    ///
    /// Writes flockwork.yaml and creates the shared files. Running it again
    /// on an initialized directory changes nothing.
    Init(InitArgs),

    /// Append commands to the task list.
    ///
    /// Commands already in the list are skipped.
    Add(AddArgs),

    /// Run a worker until no work is left.
    ///
    /// Each task's command is split into words and run without a shell; a
    /// non-zero exit stops the worker and leaves the task claimed.
    Work(WorkArgs),

    /// Show slot counts and the workers holding claimed tasks.
    Status,

    /// Publish progress snapshots, or print the current one.
    Progress(ProgressArgs),

    /// Free tasks claimed by workers that are no longer running.
    ///
    /// With `--force`, every claimed task is freed, live owners included.
    Release(ReleaseArgs),

    /// Remove the shared state of the work directory.
    Clear(ClearArgs),

    /// Task board commands.
    ///
    /// A board is an id-tagged alternative to the task list and status table.
    Board(BoardCommand),
}

/// Arguments for the `init` command.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Tasks claimed per round.
    #[arg(long)]
    pub num_tasks: Option<usize>,

    /// Value bytes per status slot (1-8); bounds the number of worker ids.
    #[arg(long)]
    pub use_bytes: Option<usize>,
}

/// Arguments for the `add` command.
#[derive(Parser, Debug)]
pub struct AddArgs {
    /// Commands to add, one task each.
    pub commands: Vec<String>,

    /// Read additional commands from a file, one per line.
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,
}

/// Arguments for the `work` command.
#[derive(Parser, Debug)]
pub struct WorkArgs {
    /// Tasks claimed per round (overrides config `num_tasks`).
    #[arg(long)]
    pub tasks: Option<usize>,

    /// Backoff while peers hold the remaining work (overrides config `wait_ms`).
    #[arg(long)]
    pub wait_ms: Option<u64>,

    /// Work from the named task board instead of the task list.
    #[arg(long, value_name = "NAME")]
    pub board: Option<String>,
}

/// Arguments for the `progress` command.
#[derive(Parser, Debug)]
pub struct ProgressArgs {
    /// Print one progress line and exit.
    #[arg(long)]
    pub report: bool,

    /// Refresh interval (overrides config `progress_refresh_ms`).
    #[arg(long)]
    pub refresh_ms: Option<u64>,
}

/// Arguments for the `release` command.
#[derive(Parser, Debug)]
pub struct ReleaseArgs {
    /// Release even tasks held by workers that are still alive.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `clear` command.
#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Clear even while workers are running.
    #[arg(long)]
    pub force: bool,
}

/// Board subcommands.
#[derive(Parser, Debug)]
pub struct BoardCommand {
    #[command(subcommand)]
    pub action: BoardAction,
}

/// Available board actions.
#[derive(Subcommand, Debug)]
pub enum BoardAction {
    /// Push commands onto a board.
    Push(BoardPushArgs),

    /// List a board's entries with their owners.
    List(BoardNameArgs),

    /// Drop every entry of a board.
    Clear(BoardNameArgs),
}

/// Arguments for `board push`.
#[derive(Parser, Debug)]
pub struct BoardPushArgs {
    /// Board name.
    pub name: String,

    /// Commands to push, one task each.
    #[arg(required = true)]
    pub commands: Vec<String>,
}

/// Arguments naming a board.
#[derive(Parser, Debug)]
pub struct BoardNameArgs {
    /// Board name.
    pub name: String,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_release_help_describes_force() {
        let command = Cli::command();
        let release = command.find_subcommand("release").unwrap();

        let about = release.get_about().unwrap().to_string();
        assert!(about.contains("no longer running"));
        let long_about = release.get_long_about().unwrap().to_string();
        assert!(long_about.contains("--force"));
    }

    #[test]
    fn cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["flockwork", "init"]).unwrap();
        assert!(cli.dir.is_none());
        match cli.command {
            Command::Init(args) => {
                assert!(args.num_tasks.is_none());
                assert!(args.use_bytes.is_none());
            }
            other => panic!("Expected Init command, got {:?}", other),
        }
    }

    #[test]
    fn parse_global_dir_after_subcommand() {
        let cli = Cli::try_parse_from(["flockwork", "status", "-C", "/tmp/w"]).unwrap();
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/w")));
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn parse_add_commands() {
        let cli =
            Cli::try_parse_from(["flockwork", "add", "echo a", "sleep 1", "--file", "more.txt"])
                .unwrap();
        if let Command::Add(args) = cli.command {
            assert_eq!(args.commands, vec!["echo a", "sleep 1"]);
            assert_eq!(args.file, Some(PathBuf::from("more.txt")));
        } else {
            panic!("Expected Add command");
        }
    }

    #[test]
    fn parse_work_overrides() {
        let cli = Cli::try_parse_from([
            "flockwork",
            "work",
            "--tasks",
            "3",
            "--wait-ms",
            "250",
            "--board",
            "jobs",
        ])
        .unwrap();
        if let Command::Work(args) = cli.command {
            assert_eq!(args.tasks, Some(3));
            assert_eq!(args.wait_ms, Some(250));
            assert_eq!(args.board.as_deref(), Some("jobs"));
        } else {
            panic!("Expected Work command");
        }
    }

    #[test]
    fn parse_progress_report() {
        let cli = Cli::try_parse_from(["flockwork", "progress", "--report"]).unwrap();
        if let Command::Progress(args) = cli.command {
            assert!(args.report);
            assert!(args.refresh_ms.is_none());
        } else {
            panic!("Expected Progress command");
        }
    }

    #[test]
    fn parse_board_push_requires_commands() {
        assert!(Cli::try_parse_from(["flockwork", "board", "push", "jobs"]).is_err());

        let cli = Cli::try_parse_from(["flockwork", "board", "push", "jobs", "echo x"]).unwrap();
        match cli.command {
            Command::Board(BoardCommand {
                action: BoardAction::Push(args),
            }) => {
                assert_eq!(args.name, "jobs");
                assert_eq!(args.commands, vec!["echo x"]);
            }
            other => panic!("Expected board push, got {:?}", other),
        }
    }

    #[test]
    fn parse_clear_force() {
        let cli = Cli::try_parse_from(["flockwork", "clear", "--force"]).unwrap();
        assert!(matches!(cli.command, Command::Clear(ClearArgs { force: true })));
    }
}
