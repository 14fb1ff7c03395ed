//! IPC protocol types for daemon communication.
//!
//! Pure mapping layer: inbound records become entity values, store
//! outcomes become response variants. No conflict or derivation logic
//! lives here.

use crate::store::StoreError;
use crate::types::{Epic, Status, Subtask, Task, TaskId, WorkItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request sent from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Create a standalone task.
    AddTask {
        name: String,
        description: String,
        status: Option<Status>,
        duration_mins: i64,
        start_time: Option<DateTime<Utc>>,
    },

    /// Full-replacement update of a task.
    UpdateTask {
        id: TaskId,
        name: String,
        description: String,
        status: Status,
        duration_mins: i64,
        start_time: Option<DateTime<Utc>>,
    },

    /// Create an epic (aggregates are always derived, never supplied).
    AddEpic { name: String, description: String },

    /// Replace an epic's name and description.
    UpdateEpic {
        id: TaskId,
        name: String,
        description: String,
    },

    /// Create a subtask owned by an epic.
    AddSubtask {
        name: String,
        description: String,
        status: Option<Status>,
        duration_mins: i64,
        start_time: Option<DateTime<Utc>>,
        epic_id: TaskId,
    },

    /// Full-replacement update of a subtask (changing `epic_id` moves it).
    UpdateSubtask {
        id: TaskId,
        name: String,
        description: String,
        status: Status,
        duration_mins: i64,
        start_time: Option<DateTime<Utc>>,
        epic_id: TaskId,
    },

    /// Get one entity by id (records the access in the history).
    GetTask { id: TaskId },
    GetEpic { id: TaskId },
    GetSubtask { id: TaskId },

    /// Snapshot listings.
    Tasks,
    Epics,
    Subtasks,

    /// Subtasks of one epic, in the epic's stored order.
    EpicSubtasks { epic_id: TaskId },

    /// Delete by id (deleting an epic cascades to its subtasks).
    DeleteTask { id: TaskId },
    DeleteEpic { id: TaskId },
    DeleteSubtask { id: TaskId },

    /// Scheduled items ordered by start time.
    Prioritized,

    /// Recency-ordered access history.
    History,

    /// Shutdown the daemon.
    Shutdown,

    /// Ping to check if the daemon is alive.
    Ping,
}

/// Response sent from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Assigned or affected id.
    Id { id: TaskId },

    /// Single entity responses.
    Task { task: Task },
    Epic { epic: Epic },
    Subtask { subtask: Subtask },

    /// Homogeneous listings.
    Tasks { tasks: Vec<Task> },
    Epics { epics: Vec<Epic> },
    Subtasks { subtasks: Vec<Subtask> },

    /// Mixed listings (prioritized, history).
    Items { items: Vec<WorkItem> },

    /// Referenced id does not exist.
    NotFound { id: TaskId },

    /// Scheduling conflict; the operation was refused.
    Conflict { message: String },

    /// Operation succeeded with nothing to return.
    Ok,

    /// Pong response to ping.
    Pong,

    /// Any other failure.
    Error { message: String },
}

impl Response {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Map a store outcome to its wire variant.
    pub fn from_store_error(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => Response::NotFound { id },
            StoreError::ScheduleConflict => Response::Conflict {
                message: error.to_string(),
            },
            StoreError::Validation(_) => Response::error(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::AddTask {
            name: "Test".to_string(),
            description: String::new(),
            status: None,
            duration_mins: 15,
            start_time: None,
        };

        let json = serde_json::to_string(&req).unwrap();
        let parsed: Request = serde_json::from_str(&json).unwrap();

        if let Request::AddTask { name, duration_mins, .. } = parsed {
            assert_eq!(name, "Test");
            assert_eq!(duration_mins, 15);
        } else {
            panic!("Wrong request type");
        }
    }

    #[test]
    fn test_conflict_maps_to_conflict_variant() {
        let resp = Response::from_store_error(StoreError::ScheduleConflict);
        assert!(matches!(resp, Response::Conflict { .. }));
    }

    #[test]
    fn test_not_found_maps_to_not_found_variant() {
        let resp = Response::from_store_error(StoreError::NotFound(7));
        assert!(matches!(resp, Response::NotFound { id: 7 }));
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::error("test error");
        let json = serde_json::to_string(&resp).unwrap();

        assert!(json.contains("Error"));
        assert!(json.contains("test error"));
    }
}
