//! Background daemon serving the task store over a Unix socket.
//!
//! All requests funnel through one mpsc channel into a single owner of the
//! `TaskStore`, so CRUD, aggregation, schedule checks, and history updates
//! never interleave between concurrent clients. The store is persisted
//! through `storage` after every successful mutating request and again on
//! shutdown (lookups touch only the history, which the shutdown save
//! captures).

use crate::protocol::{Request, Response};
use crate::storage;
use crate::store::{StoreError, TaskStore};
use crate::types::{Status, Subtask, Task, TaskId};
use chrono::{DateTime, Duration, Utc};
use eyre::{Context, Result};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Directory holding the socket, PID file, and snapshot.
const PLANBOARD_DIR: &str = ".planboard";

/// Socket file name within the .planboard directory.
const SOCKET_FILE: &str = "daemon.sock";

/// PID file name within the .planboard directory.
const PID_FILE: &str = "daemon.pid";

/// Snapshot file name within the .planboard directory.
const DATA_FILE: &str = "board.jsonl";

/// Configuration for the daemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Root directory containing .planboard
    pub root: PathBuf,
}

impl DaemonConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the socket path.
    pub fn socket_path(&self) -> PathBuf {
        self.root.join(PLANBOARD_DIR).join(SOCKET_FILE)
    }

    /// Get the PID file path.
    pub fn pid_path(&self) -> PathBuf {
        self.root.join(PLANBOARD_DIR).join(PID_FILE)
    }

    /// Get the snapshot path.
    pub fn data_path(&self) -> PathBuf {
        self.root.join(PLANBOARD_DIR).join(DATA_FILE)
    }
}

/// The planboard daemon.
pub struct Daemon {
    config: DaemonConfig,
    store: TaskStore,
    shutdown: Arc<AtomicBool>,
}

impl Daemon {
    /// Create a daemon, reloading any existing snapshot.
    pub fn new(config: DaemonConfig) -> Result<Self> {
        let store = storage::load_or_default(&config.data_path()).context("Failed to load store")?;

        Ok(Self {
            config,
            store,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get a shutdown handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run the daemon (blocking).
    pub async fn run(&mut self) -> Result<()> {
        // Clean up any stale socket
        let socket_path = self.config.socket_path();
        if let Some(parent) = socket_path.parent() {
            fs::create_dir_all(parent).context("Failed to create .planboard directory")?;
        }
        if socket_path.exists() {
            fs::remove_file(&socket_path).ok();
        }

        // Write PID file
        let pid_path = self.config.pid_path();
        fs::write(&pid_path, std::process::id().to_string()).context("Failed to write PID file")?;

        // Create Unix socket listener
        let listener = UnixListener::bind(&socket_path).context("Failed to bind to Unix socket")?;
        listener
            .set_nonblocking(true)
            .context("Failed to set socket to non-blocking")?;

        log::info!("Daemon listening on {:?}", socket_path);

        // Create channel for client requests
        let (tx, mut rx) = tokio::sync::mpsc::channel::<(Request, tokio::sync::mpsc::Sender<Response>)>(100);

        // Spawn connection acceptor task
        let shutdown_flag = Arc::clone(&self.shutdown);
        tokio::spawn(async move {
            Self::accept_connections(listener, tx, shutdown_flag).await;
        });

        // Main event loop: single owner of the store
        while let Some((request, response_tx)) = rx.recv().await {
            let response = self.handle_request(request);
            let _ = response_tx.send(response).await;

            if self.shutdown.load(Ordering::Relaxed) {
                log::info!("Daemon shutting down");
                break;
            }
        }

        // Final save captures history from read-only requests
        if let Err(e) = storage::save(&self.store, &self.config.data_path()) {
            log::error!("Failed to save snapshot on shutdown: {}", e);
        }

        // Cleanup
        fs::remove_file(&socket_path).ok();
        fs::remove_file(&pid_path).ok();

        Ok(())
    }

    /// Accept connections in a background task.
    async fn accept_connections(
        listener: UnixListener,
        tx: tokio::sync::mpsc::Sender<(Request, tokio::sync::mpsc::Sender<Response>)>,
        shutdown: Arc<AtomicBool>,
    ) {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }

            // Try to accept connection with a small delay to allow checking shutdown
            match listener.accept() {
                Ok((stream, _)) => {
                    let tx_clone = tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, tx_clone).await {
                            log::warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    // No pending connections, sleep briefly
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
                Err(e) => {
                    log::error!("Accept error: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            }
        }
    }

    /// Handle a single client connection.
    async fn handle_connection(
        stream: UnixStream,
        tx: tokio::sync::mpsc::Sender<(Request, tokio::sync::mpsc::Sender<Response>)>,
    ) -> Result<()> {
        stream.set_nonblocking(false)?;

        let reader = BufReader::new(stream.try_clone()?);
        let mut writer = stream;

        for line in reader.lines() {
            let line = line.context("Failed to read line")?;
            if line.is_empty() {
                continue;
            }

            let request: Request = serde_json::from_str(&line).context("Failed to parse request")?;

            // Check for shutdown request
            let is_shutdown = matches!(request, Request::Shutdown);

            // Send to main loop and wait for response
            let (resp_tx, mut resp_rx) = tokio::sync::mpsc::channel(1);
            tx.send((request, resp_tx))
                .await
                .context("Failed to send request to daemon")?;

            if let Some(response) = resp_rx.recv().await {
                let response_json = serde_json::to_string(&response)?;
                writeln!(writer, "{}", response_json)?;
                writer.flush()?;
            }

            if is_shutdown {
                break;
            }
        }

        Ok(())
    }

    /// Handle a single request, persisting after successful mutations.
    fn handle_request(&mut self, request: Request) -> Response {
        let mutating = matches!(
            request,
            Request::AddTask { .. }
                | Request::UpdateTask { .. }
                | Request::AddEpic { .. }
                | Request::UpdateEpic { .. }
                | Request::AddSubtask { .. }
                | Request::UpdateSubtask { .. }
                | Request::DeleteTask { .. }
                | Request::DeleteEpic { .. }
                | Request::DeleteSubtask { .. }
        );

        let response = self.dispatch(request);

        let failed = matches!(
            response,
            Response::NotFound { .. } | Response::Conflict { .. } | Response::Error { .. }
        );
        if mutating && !failed
            && let Err(e) = storage::save(&self.store, &self.config.data_path())
        {
            log::error!("Failed to save snapshot: {}", e);
            return Response::error(format!("failed to persist: {}", e));
        }

        response
    }

    fn dispatch(&mut self, request: Request) -> Response {
        match request {
            Request::AddTask {
                name,
                description,
                status,
                duration_mins,
                start_time,
            } => match build_task(&name, &description, status, duration_mins, start_time) {
                Ok(task) => id_response(self.store.add_task(task)),
                Err(e) => Response::from_store_error(e),
            },

            Request::UpdateTask {
                id,
                name,
                description,
                status,
                duration_mins,
                start_time,
            } => match build_task(&name, &description, Some(status), duration_mins, start_time) {
                Ok(task) => id_response(self.store.update_task(task.with_id(id))),
                Err(e) => Response::from_store_error(e),
            },

            Request::AddEpic { name, description } => match crate::types::Epic::new(name, description) {
                Ok(epic) => id_response(self.store.add_epic(epic)),
                Err(e) => Response::from_store_error(e.into()),
            },

            Request::UpdateEpic { id, name, description } => match crate::types::Epic::new(name, description) {
                Ok(epic) => id_response(self.store.update_epic(epic.with_id(id))),
                Err(e) => Response::from_store_error(e.into()),
            },

            Request::AddSubtask {
                name,
                description,
                status,
                duration_mins,
                start_time,
                epic_id,
            } => match build_subtask(&name, &description, status, duration_mins, start_time, epic_id) {
                Ok(subtask) => id_response(self.store.add_subtask(subtask)),
                Err(e) => Response::from_store_error(e),
            },

            Request::UpdateSubtask {
                id,
                name,
                description,
                status,
                duration_mins,
                start_time,
                epic_id,
            } => match build_subtask(&name, &description, Some(status), duration_mins, start_time, epic_id) {
                Ok(subtask) => id_response(self.store.update_subtask(subtask.with_id(id))),
                Err(e) => Response::from_store_error(e),
            },

            Request::GetTask { id } => match self.store.get_task_by_id(id) {
                Ok(task) => Response::Task { task },
                Err(e) => Response::from_store_error(e),
            },

            Request::GetEpic { id } => match self.store.get_epic_by_id(id) {
                Ok(epic) => Response::Epic { epic },
                Err(e) => Response::from_store_error(e),
            },

            Request::GetSubtask { id } => match self.store.get_subtask_by_id(id) {
                Ok(subtask) => Response::Subtask { subtask },
                Err(e) => Response::from_store_error(e),
            },

            Request::Tasks => Response::Tasks {
                tasks: self.store.tasks(),
            },

            Request::Epics => Response::Epics {
                epics: self.store.epics(),
            },

            Request::Subtasks => Response::Subtasks {
                subtasks: self.store.subtasks(),
            },

            Request::EpicSubtasks { epic_id } => match self.store.subtasks_of_epic(epic_id) {
                Ok(subtasks) => Response::Subtasks { subtasks },
                Err(e) => Response::from_store_error(e),
            },

            Request::DeleteTask { id } => match self.store.delete_task_by_id(id) {
                Ok(()) => Response::Ok,
                Err(e) => Response::from_store_error(e),
            },

            Request::DeleteEpic { id } => match self.store.delete_epic_by_id(id) {
                Ok(()) => Response::Ok,
                Err(e) => Response::from_store_error(e),
            },

            Request::DeleteSubtask { id } => match self.store.delete_subtask_by_id(id) {
                Ok(_) => Response::Ok,
                Err(e) => Response::from_store_error(e),
            },

            Request::Prioritized => Response::Items {
                items: self.store.prioritized(),
            },

            Request::History => Response::Items {
                items: self.store.history(),
            },

            Request::Shutdown => {
                self.shutdown.store(true, Ordering::Relaxed);
                Response::Ok
            }

            Request::Ping => Response::Pong,
        }
    }
}

fn id_response(result: Result<TaskId, StoreError>) -> Response {
    match result {
        Ok(id) => Response::Id { id },
        Err(e) => Response::from_store_error(e),
    }
}

fn build_task(
    name: &str,
    description: &str,
    status: Option<Status>,
    duration_mins: i64,
    start_time: Option<DateTime<Utc>>,
) -> Result<Task, StoreError> {
    let mut task = Task::new(name, description, Duration::minutes(duration_mins))?;
    if let Some(status) = status {
        task = task.with_status(status);
    }
    if let Some(start) = start_time {
        task = task.scheduled_at(start);
    }
    Ok(task)
}

fn build_subtask(
    name: &str,
    description: &str,
    status: Option<Status>,
    duration_mins: i64,
    start_time: Option<DateTime<Utc>>,
    epic_id: TaskId,
) -> Result<Subtask, StoreError> {
    let mut subtask = Subtask::new(name, description, Duration::minutes(duration_mins), epic_id)?;
    if let Some(status) = status {
        subtask = subtask.with_status(status);
    }
    if let Some(start) = start_time {
        subtask = subtask.scheduled_at(start);
    }
    Ok(subtask)
}

/// Check if a daemon is running for the given root path.
pub fn is_daemon_running(root: &Path) -> bool {
    let config = DaemonConfig::new(root);
    let socket_path = config.socket_path();
    let pid_path = config.pid_path();

    // Check if socket exists
    if !socket_path.exists() {
        return false;
    }

    // Check if PID file exists and process is alive
    if let Ok(pid_str) = fs::read_to_string(&pid_path)
        && let Ok(pid) = pid_str.trim().parse::<i32>()
    {
        // Check if process exists (signal 0 doesn't send a signal but checks existence)
        unsafe {
            if libc::kill(pid, 0) == 0 {
                return true;
            }
        }
    }

    // Stale socket, clean up
    fs::remove_file(&socket_path).ok();
    fs::remove_file(&pid_path).ok();
    false
}

/// Start the daemon as a background process.
pub fn start_daemon(root: &Path) -> Result<()> {
    use std::process::Command;

    // Get the path to the current executable
    let exe = std::env::current_exe().context("Failed to get current executable")?;

    // Start daemon in background
    Command::new(exe)
        .args(["--dir", root.to_str().unwrap_or("."), "daemon"])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context("Failed to spawn daemon process")?;

    // Wait a bit for daemon to start
    std::thread::sleep(std::time::Duration::from_millis(100));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_daemon_config_paths() {
        let config = DaemonConfig::new("/test/path");
        assert_eq!(
            config.socket_path(),
            PathBuf::from("/test/path/.planboard/daemon.sock")
        );
        assert_eq!(config.pid_path(), PathBuf::from("/test/path/.planboard/daemon.pid"));
        assert_eq!(config.data_path(), PathBuf::from("/test/path/.planboard/board.jsonl"));
    }

    #[test]
    fn test_daemon_creation_without_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let config = DaemonConfig::new(temp_dir.path());
        let daemon = Daemon::new(config);
        assert!(daemon.is_ok());
    }

    #[test]
    fn test_is_daemon_running_false() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!is_daemon_running(temp_dir.path()));
    }

    #[test]
    fn test_dispatch_add_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let mut daemon = Daemon::new(DaemonConfig::new(temp_dir.path())).unwrap();

        let resp = daemon.handle_request(Request::AddTask {
            name: "Wire task".to_string(),
            description: String::new(),
            status: None,
            duration_mins: 15,
            start_time: None,
        });
        let Response::Id { id } = resp else {
            panic!("expected id response, got {:?}", resp);
        };

        let resp = daemon.handle_request(Request::GetTask { id });
        assert!(matches!(resp, Response::Task { .. }));

        // persisted after the mutation
        assert!(daemon.config.data_path().exists());
    }

    #[test]
    fn test_dispatch_conflict_outcome() {
        let temp_dir = TempDir::new().unwrap();
        let mut daemon = Daemon::new(DaemonConfig::new(temp_dir.path())).unwrap();
        let start = chrono::Utc::now();

        let add = |start_time| Request::AddTask {
            name: "Timed".to_string(),
            description: String::new(),
            status: None,
            duration_mins: 15,
            start_time: Some(start_time),
        };
        assert!(matches!(daemon.handle_request(add(start)), Response::Id { .. }));
        assert!(matches!(
            daemon.handle_request(add(start + Duration::minutes(5))),
            Response::Conflict { .. }
        ));
    }

    #[test]
    fn test_dispatch_not_found_outcome() {
        let temp_dir = TempDir::new().unwrap();
        let mut daemon = Daemon::new(DaemonConfig::new(temp_dir.path())).unwrap();
        let resp = daemon.handle_request(Request::GetEpic { id: 99 });
        assert!(matches!(resp, Response::NotFound { id: 99 }));
    }
}
