//! Shared test infrastructure for planboard integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use planboard::{Epic, Status, Subtask, Task, TaskId, TaskStore};

/// Fixed clock helper: 2024-01-15 at the given time, UTC.
pub fn at(hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, hour, min, 0).unwrap()
}

/// Test environment around a fresh store.
pub struct TestEnv {
    pub store: TaskStore,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            store: TaskStore::new(),
        }
    }

    /// Add an unscheduled task.
    pub fn add_task(&mut self, name: &str) -> TaskId {
        let task = Task::new(name, "", Duration::minutes(15)).expect("valid task");
        self.store.add_task(task).expect("Failed to add task")
    }

    /// Add a task scheduled at `start` for `mins` minutes.
    pub fn add_timed_task(&mut self, name: &str, start: DateTime<Utc>, mins: i64) -> TaskId {
        let task = Task::new(name, "", Duration::minutes(mins))
            .expect("valid task")
            .scheduled_at(start);
        self.store.add_task(task).expect("Failed to add task")
    }

    /// Add an empty epic.
    pub fn add_epic(&mut self, name: &str) -> TaskId {
        let epic = Epic::new(name, "").expect("valid epic");
        self.store.add_epic(epic).expect("Failed to add epic")
    }

    /// Add an unscheduled subtask with the given status.
    pub fn add_subtask(&mut self, epic_id: TaskId, name: &str, status: Status) -> TaskId {
        let subtask = Subtask::new(name, "", Duration::minutes(10), epic_id)
            .expect("valid subtask")
            .with_status(status);
        self.store.add_subtask(subtask).expect("Failed to add subtask")
    }

    /// Add a subtask scheduled at `start` for `mins` minutes.
    pub fn add_timed_subtask(&mut self, epic_id: TaskId, name: &str, start: DateTime<Utc>, mins: i64) -> TaskId {
        let subtask = Subtask::new(name, "", Duration::minutes(mins), epic_id)
            .expect("valid subtask")
            .scheduled_at(start);
        self.store.add_subtask(subtask).expect("Failed to add subtask")
    }

    /// Fetch an epic without recording a history access.
    pub fn epic(&self, id: TaskId) -> Epic {
        self.store
            .epics()
            .into_iter()
            .find(|e| e.id == id)
            .expect("epic should exist")
    }

    /// Fetch a subtask without recording a history access.
    pub fn subtask(&self, id: TaskId) -> Subtask {
        self.store
            .subtasks()
            .into_iter()
            .find(|s| s.id == id)
            .expect("subtask should exist")
    }

    /// Ids currently in the history, oldest first.
    pub fn history_ids(&self) -> Vec<TaskId> {
        self.store.history().iter().map(|item| item.id()).collect()
    }

    /// Ids currently in the prioritized view, earliest start first.
    pub fn prioritized_ids(&self) -> Vec<TaskId> {
        self.store.prioritized().iter().map(|item| item.id()).collect()
    }
}
