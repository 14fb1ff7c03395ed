//! planboard: an in-memory hierarchical task store.
//!
//! Planboard tracks standalone tasks, container epics, and epic-owned
//! subtasks. Epic status and timing are always derived from the current
//! subtask set, scheduled items are checked for time-interval conflicts,
//! and every lookup-by-id feeds a recency-ordered, duplicate-free history.
//!
//! # Example
//!
//! ```
//! use chrono::Duration;
//! use planboard::{Epic, Status, Subtask, TaskStore};
//!
//! let mut store = TaskStore::new();
//!
//! // An epic starts empty, with status New
//! let epic_id = store.add_epic(Epic::new("Release 1.0", "ship it").unwrap()).unwrap();
//!
//! // Its aggregates follow the subtasks
//! let done = Subtask::new("Write docs", "", Duration::minutes(60), epic_id)
//!     .unwrap()
//!     .with_status(Status::Done);
//! store.add_subtask(done).unwrap();
//! let open = Subtask::new("Cut tag", "", Duration::minutes(5), epic_id).unwrap();
//! let open_id = store.add_subtask(open).unwrap();
//!
//! assert_eq!(store.epics()[0].status, Status::InProgress);
//!
//! // Deleting the unfinished subtask flips the epic to Done
//! store.delete_subtask_by_id(open_id).unwrap();
//! assert_eq!(store.epics()[0].status, Status::Done);
//! ```

mod history;
mod schedule;
mod store;
mod types;

pub mod client;
pub mod daemon;
pub mod protocol;
pub mod storage;

// Re-export public API
pub use client::Client;
pub use daemon::{Daemon, DaemonConfig, is_daemon_running, start_daemon};
pub use protocol::{Request, Response};
pub use store::{StoreError, TaskStore};
pub use types::{Epic, Status, Subtask, Task, TaskId, UNASSIGNED_ID, ValidationError, WorkItem};
