//! planboard CLI - hierarchical task tracking with schedule conflict detection.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use planboard::{
    Client, Daemon, DaemonConfig, Epic, Status, Subtask, Task, TaskStore, WorkItem, is_daemon_running, storage,
};
use std::fs;
use std::path::PathBuf;

mod cli;

use cli::{Cli, Command, Kind, StatusArg};

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("planboard")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("planboard.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn board_dir(cli: &Cli) -> PathBuf {
    cli.dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn snapshot_path(cli: &Cli) -> PathBuf {
    DaemonConfig::new(board_dir(cli)).data_path()
}

fn parse_start(s: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .with_context(|| format!("Invalid start time '{}', expected e.g. 2024-01-15T12:00", s))?;
    Ok(naive.and_utc())
}

fn status_from_arg(arg: StatusArg) -> Status {
    match arg {
        StatusArg::New => Status::New,
        StatusArg::InProgress => Status::InProgress,
        StatusArg::Done => Status::Done,
    }
}

fn format_status(status: Status) -> ColoredString {
    match status {
        Status::New => "new".green(),
        Status::InProgress => "in_progress".yellow(),
        Status::Done => "done".blue(),
    }
}

fn format_schedule(start: Option<DateTime<Utc>>, duration: Duration) -> String {
    match start {
        Some(start) => format!("{} +{}m", start.format("%Y-%m-%d %H:%M"), duration.num_minutes()),
        None => format!("unscheduled, {}m", duration.num_minutes()),
    }
}

fn print_item(item: &WorkItem) {
    match item {
        WorkItem::Task(t) => println!(
            "{} {} {} {}",
            format!("#{}", t.id).cyan(),
            format_status(t.status),
            t.name,
            format_schedule(t.start_time, t.duration).dimmed()
        ),
        WorkItem::Epic(e) => println!(
            "{} {} {} {}",
            format!("#{}", e.id).cyan(),
            format_status(e.status),
            e.name.bold(),
            format!("[{} subtasks]", e.subtask_ids.len()).dimmed()
        ),
        WorkItem::Subtask(s) => println!(
            "{} {} {} {}",
            format!("#{}", s.id).cyan(),
            format_status(s.status),
            s.name,
            format!("(epic #{})", s.epic_id).dimmed()
        ),
    }
}

/// Load the snapshot, run one store operation, and persist the result.
fn with_store<T>(cli: &Cli, op: impl FnOnce(&mut TaskStore) -> Result<T>) -> Result<T> {
    let path = snapshot_path(cli);
    let mut store = storage::load_or_default(&path).context("Failed to load board")?;
    let result = op(&mut store)?;
    storage::save(&store, &path).context("Failed to save board")?;
    Ok(result)
}

fn run(cli: Cli) -> Result<()> {
    let root = board_dir(&cli);

    match &cli.command {
        Command::AddTask {
            name,
            description,
            duration,
            start,
            status,
        } => {
            let mut task = Task::new(name.as_str(), description.as_str(), Duration::minutes(*duration))?;
            if let Some(status) = status {
                task = task.with_status(status_from_arg(*status));
            }
            if let Some(start) = start {
                task = task.scheduled_at(parse_start(start)?);
            }
            let id = with_store(&cli, |store| store.add_task(task).map_err(|e| eyre!(e)))?;
            println!("{} Created task {} {}", "✓".green(), format!("#{}", id).cyan(), name);
        }

        Command::AddEpic { name, description } => {
            let epic = Epic::new(name.as_str(), description.as_str())?;
            let id = with_store(&cli, |store| store.add_epic(epic).map_err(|e| eyre!(e)))?;
            println!("{} Created epic {} {}", "✓".green(), format!("#{}", id).cyan(), name);
        }

        Command::AddSubtask {
            name,
            epic,
            description,
            duration,
            start,
            status,
        } => {
            let mut subtask = Subtask::new(name.as_str(), description.as_str(), Duration::minutes(*duration), *epic)?;
            if let Some(status) = status {
                subtask = subtask.with_status(status_from_arg(*status));
            }
            if let Some(start) = start {
                subtask = subtask.scheduled_at(parse_start(start)?);
            }
            let id = with_store(&cli, |store| store.add_subtask(subtask).map_err(|e| eyre!(e)))?;
            println!(
                "{} Created subtask {} {} in epic {}",
                "✓".green(),
                format!("#{}", id).cyan(),
                name,
                format!("#{}", epic).cyan()
            );
        }

        Command::List { kind, epic } => {
            let store = storage::load_or_default(&snapshot_path(&cli)).context("Failed to load board")?;
            let items: Vec<WorkItem> = match (kind, epic) {
                (Kind::Task, _) => store.tasks().into_iter().map(WorkItem::Task).collect(),
                (Kind::Epic, _) => store.epics().into_iter().map(WorkItem::Epic).collect(),
                (Kind::Subtask, Some(epic_id)) => store
                    .subtasks_of_epic(*epic_id)
                    .map_err(|e| eyre!(e))?
                    .into_iter()
                    .map(WorkItem::Subtask)
                    .collect(),
                (Kind::Subtask, None) => store.subtasks().into_iter().map(WorkItem::Subtask).collect(),
            };

            if items.is_empty() {
                println!("{}", "No items found".dimmed());
            } else {
                for item in &items {
                    print_item(item);
                }
            }
        }

        Command::Get { kind, id } => {
            let item = with_store(&cli, |store| {
                let item = match kind {
                    Kind::Task => WorkItem::Task(store.get_task_by_id(*id).map_err(|e| eyre!(e))?),
                    Kind::Epic => WorkItem::Epic(store.get_epic_by_id(*id).map_err(|e| eyre!(e))?),
                    Kind::Subtask => WorkItem::Subtask(store.get_subtask_by_id(*id).map_err(|e| eyre!(e))?),
                };
                Ok(item)
            })?;

            println!("{}: {}", "ID".bold(), format!("#{}", item.id()).cyan());
            println!("{}: {}", "Name".bold(), item.name());
            println!("{}: {}", "Status".bold(), format_status(item.status()));
            match &item {
                WorkItem::Task(t) => {
                    println!("{}: {}", "Description".bold(), t.description);
                    println!("{}: {}", "Schedule".bold(), format_schedule(t.start_time, t.duration));
                }
                WorkItem::Epic(e) => {
                    println!("{}: {}", "Description".bold(), e.description);
                    println!("{}: {}", "Schedule".bold(), format_schedule(e.start_time, e.duration));
                    println!(
                        "{}: {}",
                        "Subtasks".bold(),
                        e.subtask_ids
                            .iter()
                            .map(|id| format!("#{}", id))
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                }
                WorkItem::Subtask(s) => {
                    println!("{}: {}", "Description".bold(), s.description);
                    println!("{}: {}", "Schedule".bold(), format_schedule(s.start_time, s.duration));
                    println!("{}: {}", "Epic".bold(), format!("#{}", s.epic_id).cyan());
                }
            }
        }

        Command::Delete { kind, id } => {
            with_store(&cli, |store| {
                match kind {
                    Kind::Task => store.delete_task_by_id(*id).map_err(|e| eyre!(e))?,
                    Kind::Epic => store.delete_epic_by_id(*id).map_err(|e| eyre!(e))?,
                    Kind::Subtask => {
                        store.delete_subtask_by_id(*id).map_err(|e| eyre!(e))?;
                    }
                }
                Ok(())
            })?;
            println!("{} Deleted {}", "✓".green(), format!("#{}", id).cyan());
        }

        Command::Prioritized => {
            let store = storage::load_or_default(&snapshot_path(&cli)).context("Failed to load board")?;
            let items = store.prioritized();

            if items.is_empty() {
                println!("{}", "Nothing scheduled".dimmed());
            } else {
                for item in &items {
                    print_item(item);
                }
            }
        }

        Command::History => {
            let store = storage::load_or_default(&snapshot_path(&cli)).context("Failed to load board")?;
            let items = store.history();

            if items.is_empty() {
                println!("{}", "No history yet".dimmed());
            } else {
                for item in &items {
                    print_item(item);
                }
            }
        }

        Command::Daemon => {
            println!("{} Starting daemon for {}", "→".blue(), root.display());

            let config = DaemonConfig::new(&root);
            let mut daemon = Daemon::new(config).context("Failed to create daemon")?;

            // Run daemon in async runtime
            let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
            rt.block_on(async { daemon.run().await }).context("Daemon error")?;
        }

        Command::DaemonStop => {
            if !is_daemon_running(&root) {
                println!("{} Daemon is not running", "✗".red());
                std::process::exit(1);
            }

            let mut client = Client::connect(&root, false).context("Failed to connect to daemon")?;
            client.shutdown().context("Failed to shutdown daemon")?;
            println!("{} Daemon stopped", "✓".green());
        }

        Command::DaemonStatus => {
            if is_daemon_running(&root) {
                println!("{} Daemon is running", "✓".green());

                // Try to ping
                if let Ok(mut client) = Client::connect(&root, false)
                    && client.ping().is_ok()
                {
                    println!("  {} Responding to requests", "✓".green());
                }
            } else {
                println!("{} Daemon is not running", "✗".red());
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    info!("Command: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
