//! Client for connecting to the planboard daemon.

use crate::daemon::{DaemonConfig, is_daemon_running, start_daemon};
use crate::protocol::{Request, Response};
use crate::types::{Epic, Subtask, Task, TaskId, WorkItem};
use eyre::{Context, Result, bail};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client for communicating with the planboard daemon.
pub struct Client {
    root: PathBuf,
    stream: UnixStream,
}

impl Client {
    /// Connect to the daemon, optionally auto-starting it if not running.
    pub fn connect(root: &Path, auto_start: bool) -> Result<Self> {
        let config = DaemonConfig::new(root);
        let socket_path = config.socket_path();

        // Try to connect, auto-start if needed
        let stream = match UnixStream::connect(&socket_path) {
            Ok(stream) => stream,
            Err(_) if auto_start => {
                if !is_daemon_running(root) {
                    start_daemon(root).context("Failed to auto-start daemon")?;

                    // Wait for daemon to be ready
                    let mut attempts = 0;
                    loop {
                        if attempts > 20 {
                            bail!("Daemon failed to start in time");
                        }
                        std::thread::sleep(Duration::from_millis(50));
                        if let Ok(stream) = UnixStream::connect(&socket_path) {
                            break stream;
                        }
                        attempts += 1;
                    }
                } else {
                    UnixStream::connect(&socket_path).context("Failed to connect to daemon")?
                }
            }
            Err(e) => {
                bail!("Failed to connect to daemon: {}. Is it running?", e);
            }
        };

        // Set read timeout
        stream
            .set_read_timeout(Some(Duration::from_secs(30)))
            .context("Failed to set read timeout")?;

        Ok(Self {
            root: root.to_path_buf(),
            stream,
        })
    }

    /// Get the store root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Send a request and receive a response.
    pub fn request(&mut self, request: Request) -> Result<Response> {
        let request_json = serde_json::to_string(&request)?;
        writeln!(self.stream, "{}", request_json)?;
        self.stream.flush()?;

        let mut reader = BufReader::new(&self.stream);
        let mut response_line = String::new();
        reader.read_line(&mut response_line)?;

        let response: Response = serde_json::from_str(&response_line)?;
        Ok(response)
    }

    fn expect_id(&mut self, request: Request) -> Result<TaskId> {
        match self.request(request)? {
            Response::Id { id } => Ok(id),
            Response::NotFound { id } => bail!("not found: {}", id),
            Response::Conflict { message } => bail!("{}", message),
            Response::Error { message } => bail!("{}", message),
            _ => bail!("Unexpected response"),
        }
    }

    /// Create a standalone task; returns its assigned id.
    pub fn add_task(&mut self, request: Request) -> Result<TaskId> {
        debug_assert!(matches!(request, Request::AddTask { .. }));
        self.expect_id(request)
    }

    /// Create an epic; returns its assigned id.
    pub fn add_epic(&mut self, name: &str, description: &str) -> Result<TaskId> {
        self.expect_id(Request::AddEpic {
            name: name.to_string(),
            description: description.to_string(),
        })
    }

    /// Create a subtask; returns its assigned id.
    pub fn add_subtask(&mut self, request: Request) -> Result<TaskId> {
        debug_assert!(matches!(request, Request::AddSubtask { .. }));
        self.expect_id(request)
    }

    /// Full-replacement update; returns the updated id.
    pub fn update(&mut self, request: Request) -> Result<TaskId> {
        debug_assert!(matches!(
            request,
            Request::UpdateTask { .. } | Request::UpdateEpic { .. } | Request::UpdateSubtask { .. }
        ));
        self.expect_id(request)
    }

    /// Get a task by id, or `None` if absent.
    pub fn get_task(&mut self, id: TaskId) -> Result<Option<Task>> {
        match self.request(Request::GetTask { id })? {
            Response::Task { task } => Ok(Some(task)),
            Response::NotFound { .. } => Ok(None),
            Response::Error { message } => bail!("{}", message),
            _ => bail!("Unexpected response"),
        }
    }

    /// Get an epic by id, or `None` if absent.
    pub fn get_epic(&mut self, id: TaskId) -> Result<Option<Epic>> {
        match self.request(Request::GetEpic { id })? {
            Response::Epic { epic } => Ok(Some(epic)),
            Response::NotFound { .. } => Ok(None),
            Response::Error { message } => bail!("{}", message),
            _ => bail!("Unexpected response"),
        }
    }

    /// Get a subtask by id, or `None` if absent.
    pub fn get_subtask(&mut self, id: TaskId) -> Result<Option<Subtask>> {
        match self.request(Request::GetSubtask { id })? {
            Response::Subtask { subtask } => Ok(Some(subtask)),
            Response::NotFound { .. } => Ok(None),
            Response::Error { message } => bail!("{}", message),
            _ => bail!("Unexpected response"),
        }
    }

    /// List all tasks.
    pub fn tasks(&mut self) -> Result<Vec<Task>> {
        match self.request(Request::Tasks)? {
            Response::Tasks { tasks } => Ok(tasks),
            Response::Error { message } => bail!("{}", message),
            _ => bail!("Unexpected response"),
        }
    }

    /// List all epics.
    pub fn epics(&mut self) -> Result<Vec<Epic>> {
        match self.request(Request::Epics)? {
            Response::Epics { epics } => Ok(epics),
            Response::Error { message } => bail!("{}", message),
            _ => bail!("Unexpected response"),
        }
    }

    /// List all subtasks, or only those of one epic.
    pub fn subtasks(&mut self, epic_id: Option<TaskId>) -> Result<Vec<Subtask>> {
        let request = match epic_id {
            Some(epic_id) => Request::EpicSubtasks { epic_id },
            None => Request::Subtasks,
        };
        match self.request(request)? {
            Response::Subtasks { subtasks } => Ok(subtasks),
            Response::NotFound { id } => bail!("not found: {}", id),
            Response::Error { message } => bail!("{}", message),
            _ => bail!("Unexpected response"),
        }
    }

    /// Delete a task by id.
    pub fn delete_task(&mut self, id: TaskId) -> Result<()> {
        self.expect_ok(Request::DeleteTask { id })
    }

    /// Delete an epic (and its subtasks) by id.
    pub fn delete_epic(&mut self, id: TaskId) -> Result<()> {
        self.expect_ok(Request::DeleteEpic { id })
    }

    /// Delete a subtask by id.
    pub fn delete_subtask(&mut self, id: TaskId) -> Result<()> {
        self.expect_ok(Request::DeleteSubtask { id })
    }

    /// Scheduled items ordered by start time.
    pub fn prioritized(&mut self) -> Result<Vec<WorkItem>> {
        match self.request(Request::Prioritized)? {
            Response::Items { items } => Ok(items),
            Response::Error { message } => bail!("{}", message),
            _ => bail!("Unexpected response"),
        }
    }

    /// Recency-ordered access history.
    pub fn history(&mut self) -> Result<Vec<WorkItem>> {
        match self.request(Request::History)? {
            Response::Items { items } => Ok(items),
            Response::Error { message } => bail!("{}", message),
            _ => bail!("Unexpected response"),
        }
    }

    /// Shutdown the daemon.
    pub fn shutdown(&mut self) -> Result<()> {
        self.expect_ok(Request::Shutdown)
    }

    /// Ping the daemon.
    pub fn ping(&mut self) -> Result<()> {
        match self.request(Request::Ping)? {
            Response::Pong => Ok(()),
            Response::Error { message } => bail!("{}", message),
            _ => bail!("Unexpected response"),
        }
    }

    fn expect_ok(&mut self, request: Request) -> Result<()> {
        match self.request(request)? {
            Response::Ok => Ok(()),
            Response::NotFound { id } => bail!("not found: {}", id),
            Response::Error { message } => bail!("{}", message),
            _ => bail!("Unexpected response"),
        }
    }
}
