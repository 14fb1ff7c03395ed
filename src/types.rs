//! Core data types for the planboard task store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Store-assigned integer identifier. The sequence starts at 1;
/// 0 marks an entity that has not been assigned an id (or has been deleted).
pub type TaskId = u32;

/// Sentinel for an unassigned or retired id.
pub const UNASSIGNED_ID: TaskId = 0;

/// Work item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    New,
    InProgress,
    Done,
}

/// Serialize a `chrono::Duration` as whole minutes.
pub(crate) mod duration_mins {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_minutes())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let mins = i64::deserialize(d)?;
        Ok(Duration::minutes(mins))
    }
}

/// A standalone unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique across tasks, epics, and subtasks; assigned by the store.
    pub id: TaskId,

    /// Short description of the work
    pub name: String,

    /// Longer free-text details
    pub description: String,

    /// Current state
    pub status: Status,

    /// Planned time span (non-negative)
    #[serde(with = "duration_mins")]
    pub duration: Duration,

    /// Planned start, if the task is scheduled
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub start_time: Option<DateTime<Utc>>,
}

/// A container item whose status, duration, and time window are
/// derived from its subtasks. Aggregate fields are owned by the store's
/// aggregation pass and are never accepted as caller input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epic {
    pub id: TaskId,
    pub name: String,
    pub description: String,

    /// Derived: all-New -> New, all-Done -> Done, anything mixed -> InProgress
    pub status: Status,

    /// Derived: sum of subtask durations
    #[serde(with = "duration_mins")]
    pub duration: Duration,

    /// Derived: earliest subtask start
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub start_time: Option<DateTime<Utc>>,

    /// Derived: latest subtask end (not `start + duration`, since
    /// subtask schedules may have gaps)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end_time: Option<DateTime<Utc>>,

    /// Owned subtask ids, in insertion order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtask_ids: Vec<TaskId>,
}

/// A leaf item owned by exactly one epic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    pub status: Status,

    #[serde(with = "duration_mins")]
    pub duration: Duration,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub start_time: Option<DateTime<Utc>>,

    /// The owning epic (lookup relation; the epic holds the ownership edge)
    pub epic_id: TaskId,
}

/// Validation errors for entity construction.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyName,
    NegativeDuration,
    SubMinuteDuration,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyName => write!(f, "name cannot be empty"),
            ValidationError::NegativeDuration => write!(f, "duration cannot be negative"),
            ValidationError::SubMinuteDuration => {
                write!(f, "duration must be a whole number of minutes")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl Task {
    /// Create an unscheduled task with status `New`. The id is assigned
    /// by the store on add.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        duration: Duration,
    ) -> Result<Self, ValidationError> {
        let task = Self {
            id: UNASSIGNED_ID,
            name: name.into(),
            description: description.into(),
            status: Status::New,
            duration,
            start_time: None,
        };
        task.validate()?;
        Ok(task)
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn scheduled_at(mut self, start: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self
    }

    /// Key an update to an existing store entry.
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    /// Planned end: `start + duration`, absent when unscheduled.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.start_time.map(|start| start + self.duration)
    }

    /// Check the structurally impossible states (ownership and
    /// reference checks live in the store, which has the full id index).
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, self.duration)
    }
}

impl Epic {
    /// Create an empty epic. Aggregate fields start at their
    /// no-subtasks values and are recomputed by the store.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Result<Self, ValidationError> {
        let epic = Self {
            id: UNASSIGNED_ID,
            name: name.into(),
            description: description.into(),
            status: Status::New,
            duration: Duration::zero(),
            start_time: None,
            end_time: None,
            subtask_ids: Vec::new(),
        };
        epic.validate()?;
        Ok(epic)
    }

    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(())
    }
}

impl Subtask {
    /// Create an unscheduled subtask with status `New`, owned by `epic_id`.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        duration: Duration,
        epic_id: TaskId,
    ) -> Result<Self, ValidationError> {
        let subtask = Self {
            id: UNASSIGNED_ID,
            name: name.into(),
            description: description.into(),
            status: Status::New,
            duration,
            start_time: None,
            epic_id,
        };
        subtask.validate()?;
        Ok(subtask)
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn scheduled_at(mut self, start: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self
    }

    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    /// Reassign to a different owning epic (validated by the store on update).
    pub fn with_epic(mut self, epic_id: TaskId) -> Self {
        self.epic_id = epic_id;
        self
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.start_time.map(|start| start + self.duration)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, self.duration)
    }
}

fn validate_fields(name: &str, duration: Duration) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if duration < Duration::zero() {
        return Err(ValidationError::NegativeDuration);
    }
    // Durations are stored at minute granularity; anything finer would be
    // truncated on serialization and shift conflict outcomes after reload.
    if duration != Duration::minutes(duration.num_minutes()) {
        return Err(ValidationError::SubMinuteDuration);
    }
    Ok(())
}

// Identity: two entities are the same iff their ids are equal.
impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Task {}
impl Hash for Task {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialEq for Epic {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Epic {}
impl Hash for Epic {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialEq for Subtask {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Subtask {}
impl Hash for Subtask {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Kind-erased view over the three entity kinds, used by the history,
/// prioritized, and wire surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkItem {
    Task(Task),
    Epic(Epic),
    Subtask(Subtask),
}

impl WorkItem {
    pub fn id(&self) -> TaskId {
        match self {
            WorkItem::Task(t) => t.id,
            WorkItem::Epic(e) => e.id,
            WorkItem::Subtask(s) => s.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            WorkItem::Task(t) => &t.name,
            WorkItem::Epic(e) => &e.name,
            WorkItem::Subtask(s) => &s.name,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            WorkItem::Task(t) => t.status,
            WorkItem::Epic(e) => e.status,
            WorkItem::Subtask(s) => s.status,
        }
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        match self {
            WorkItem::Task(t) => t.start_time,
            WorkItem::Epic(e) => e.start_time,
            WorkItem::Subtask(s) => s.start_time,
        }
    }
}
