//! CLI argument parsing for planboard.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pb",
    about = "Hierarchical task tracking with epics, subtasks, and schedule conflict detection",
    version,
    after_help = "Logs are written to: ~/.local/share/planboard/logs/planboard.log"
)]
pub struct Cli {
    /// Path to the board root directory (default: current directory)
    #[arg(short = 'd', long, global = true)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Kind {
    Task,
    Epic,
    Subtask,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    New,
    InProgress,
    Done,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a standalone task
    AddTask {
        /// Task name
        name: String,

        /// Description
        #[arg(short = 'D', long, default_value = "")]
        description: String,

        /// Planned duration in minutes
        #[arg(short = 'm', long, default_value = "0")]
        duration: i64,

        /// Planned start time (e.g. 2024-01-15T12:00, UTC)
        #[arg(short, long)]
        start: Option<String>,

        /// Initial status
        #[arg(long)]
        status: Option<StatusArg>,
    },

    /// Create an epic (status and timing are derived from its subtasks)
    AddEpic {
        /// Epic name
        name: String,

        /// Description
        #[arg(short = 'D', long, default_value = "")]
        description: String,
    },

    /// Create a subtask owned by an epic
    AddSubtask {
        /// Subtask name
        name: String,

        /// Owning epic id
        #[arg(short, long)]
        epic: u32,

        /// Description
        #[arg(short = 'D', long, default_value = "")]
        description: String,

        /// Planned duration in minutes
        #[arg(short = 'm', long, default_value = "0")]
        duration: i64,

        /// Planned start time (e.g. 2024-01-15T12:00, UTC)
        #[arg(short, long)]
        start: Option<String>,

        /// Initial status
        #[arg(long)]
        status: Option<StatusArg>,
    },

    /// List tasks, epics, or subtasks
    List {
        /// What to list
        #[arg(value_enum)]
        kind: Kind,

        /// For subtasks: restrict to one epic
        #[arg(short, long)]
        epic: Option<u32>,
    },

    /// Get one item by id
    Get {
        /// Item kind
        #[arg(value_enum)]
        kind: Kind,

        /// Item id
        id: u32,
    },

    /// Delete one item by id (deleting an epic removes its subtasks)
    Delete {
        /// Item kind
        #[arg(value_enum)]
        kind: Kind,

        /// Item id
        id: u32,
    },

    /// Show scheduled items ordered by start time
    Prioritized,

    /// Show the access history, oldest first
    History,

    /// Run the daemon in foreground
    Daemon,

    /// Stop the running daemon
    DaemonStop,

    /// Check daemon status
    DaemonStatus,
}
