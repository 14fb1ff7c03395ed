//! In-memory task store: CRUD, epic aggregation, conflict checks, history.

use crate::history::HistoryTracker;
use crate::schedule::ScheduleIndex;
use crate::types::{Epic, Status, Subtask, Task, TaskId, UNASSIGNED_ID, ValidationError, WorkItem};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Referenced id does not exist (or names the wrong kind of entity).
    NotFound(TaskId),
    /// The candidate's time interval overlaps an existing scheduled item.
    ScheduleConflict,
    /// Malformed input rejected before any store interaction.
    Validation(ValidationError),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "item not found: {}", id),
            StoreError::ScheduleConflict => {
                write!(f, "time interval overlaps an already scheduled item")
            }
            StoreError::Validation(e) => write!(f, "validation error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<ValidationError> for StoreError {
    fn from(e: ValidationError) -> Self {
        StoreError::Validation(e)
    }
}

/// The main planboard store.
///
/// Sole owner of entity lifetime: entities enter through `add_*`, change
/// through full-replacement `update_*`, and leave through `delete_*`.
/// Every successful mutation leaves the schedule index, the history
/// tracker, and all epic aggregates consistent with the entity maps.
#[derive(Debug, Default)]
pub struct TaskStore {
    id_seq: TaskId,
    tasks: HashMap<TaskId, Task>,
    epics: HashMap<TaskId, Epic>,
    subtasks: HashMap<TaskId, Subtask>,
    schedule: ScheduleIndex,
    history: HistoryTracker,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> TaskId {
        self.id_seq += 1;
        self.id_seq
    }

    /// Add a standalone task. Refused with `ScheduleConflict` if its
    /// interval overlaps an existing scheduled item; nothing is stored
    /// on failure.
    pub fn add_task(&mut self, mut task: Task) -> Result<TaskId, StoreError> {
        task.validate()?;
        self.ensure_no_conflict(task.start_time, task.duration, None)?;

        let id = self.next_id();
        task.id = id;
        self.reindex(id, task.start_time, task.duration);
        self.tasks.insert(id, task);
        Ok(id)
    }

    /// Add an epic. Aggregate fields supplied by the caller are discarded:
    /// a fresh epic starts empty, status `New`, zero duration, unscheduled.
    pub fn add_epic(&mut self, mut epic: Epic) -> Result<TaskId, StoreError> {
        epic.validate()?;

        let id = self.next_id();
        epic.id = id;
        epic.status = Status::New;
        epic.duration = Duration::zero();
        epic.start_time = None;
        epic.end_time = None;
        epic.subtask_ids.clear();
        self.epics.insert(id, epic);
        Ok(id)
    }

    /// Add a subtask to its owning epic and re-derive that epic's
    /// aggregates. `NotFound` if `epic_id` does not name an existing epic
    /// (a task or subtask id is rejected the same way).
    pub fn add_subtask(&mut self, mut subtask: Subtask) -> Result<TaskId, StoreError> {
        subtask.validate()?;
        if !self.epics.contains_key(&subtask.epic_id) {
            return Err(StoreError::NotFound(subtask.epic_id));
        }
        self.ensure_no_conflict(subtask.start_time, subtask.duration, None)?;

        let id = self.next_id();
        subtask.id = id;
        let epic_id = subtask.epic_id;
        self.reindex(id, subtask.start_time, subtask.duration);
        self.subtasks.insert(id, subtask);
        if let Some(epic) = self.epics.get_mut(&epic_id) {
            epic.subtask_ids.push(id);
        }
        self.recompute_epic(epic_id);
        Ok(id)
    }

    /// Replace a stored task wholesale. The task's own previous interval
    /// is excluded from the conflict check, so updating into the same
    /// slot never conflicts.
    pub fn update_task(&mut self, task: Task) -> Result<TaskId, StoreError> {
        task.validate()?;
        if !self.tasks.contains_key(&task.id) {
            return Err(StoreError::NotFound(task.id));
        }
        self.ensure_no_conflict(task.start_time, task.duration, Some(task.id))?;

        let id = task.id;
        self.reindex(id, task.start_time, task.duration);
        self.tasks.insert(id, task);
        Ok(id)
    }

    /// Replace an epic's name and description. Aggregate fields in the
    /// input are overwritten by re-running aggregation.
    pub fn update_epic(&mut self, epic: Epic) -> Result<TaskId, StoreError> {
        epic.validate()?;
        let id = epic.id;
        let stored = self.epics.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        stored.name = epic.name;
        stored.description = epic.description;
        self.recompute_epic(id);
        Ok(id)
    }

    /// Replace a stored subtask wholesale and re-derive the owning epic.
    /// Changing `epic_id` moves the subtask to a different epic; both the
    /// old and new owners are re-aggregated.
    pub fn update_subtask(&mut self, subtask: Subtask) -> Result<TaskId, StoreError> {
        subtask.validate()?;
        let id = subtask.id;
        let old_epic_id = match self.subtasks.get(&id) {
            Some(old) => old.epic_id,
            None => return Err(StoreError::NotFound(id)),
        };
        if !self.epics.contains_key(&subtask.epic_id) {
            return Err(StoreError::NotFound(subtask.epic_id));
        }
        self.ensure_no_conflict(subtask.start_time, subtask.duration, Some(id))?;

        let new_epic_id = subtask.epic_id;
        self.reindex(id, subtask.start_time, subtask.duration);
        self.subtasks.insert(id, subtask);

        if new_epic_id != old_epic_id {
            if let Some(old_epic) = self.epics.get_mut(&old_epic_id) {
                old_epic.subtask_ids.retain(|&sid| sid != id);
            }
            if let Some(new_epic) = self.epics.get_mut(&new_epic_id) {
                new_epic.subtask_ids.push(id);
            }
            self.recompute_epic(old_epic_id);
        }
        self.recompute_epic(new_epic_id);
        Ok(id)
    }

    /// Remove a task from the store, the schedule index, and the history.
    pub fn delete_task_by_id(&mut self, id: TaskId) -> Result<(), StoreError> {
        self.tasks.remove(&id).ok_or(StoreError::NotFound(id))?;
        self.schedule.remove(id);
        self.history.remove(id);
        Ok(())
    }

    /// Remove an epic and cascade to every subtask it owns.
    pub fn delete_epic_by_id(&mut self, id: TaskId) -> Result<(), StoreError> {
        let epic = self.epics.remove(&id).ok_or(StoreError::NotFound(id))?;
        self.history.remove(id);
        for subtask_id in epic.subtask_ids {
            self.subtasks.remove(&subtask_id);
            self.schedule.remove(subtask_id);
            self.history.remove(subtask_id);
        }
        Ok(())
    }

    /// Remove a subtask, detach it from its owning epic, and re-derive
    /// that epic's aggregates. The returned subtask carries the sentinel
    /// id 0: a deleted subtask must not be reused as a live reference.
    pub fn delete_subtask_by_id(&mut self, id: TaskId) -> Result<Subtask, StoreError> {
        let mut subtask = self.subtasks.remove(&id).ok_or(StoreError::NotFound(id))?;
        self.schedule.remove(id);
        self.history.remove(id);
        if let Some(epic) = self.epics.get_mut(&subtask.epic_id) {
            epic.subtask_ids.retain(|&sid| sid != id);
        }
        self.recompute_epic(subtask.epic_id);
        subtask.id = UNASSIGNED_ID;
        Ok(subtask)
    }

    /// Look up a task and record the access in the history.
    pub fn get_task_by_id(&mut self, id: TaskId) -> Result<Task, StoreError> {
        let task = self.tasks.get(&id).cloned().ok_or(StoreError::NotFound(id))?;
        self.history.record_access(id);
        Ok(task)
    }

    /// Look up an epic and record the access in the history.
    pub fn get_epic_by_id(&mut self, id: TaskId) -> Result<Epic, StoreError> {
        let epic = self.epics.get(&id).cloned().ok_or(StoreError::NotFound(id))?;
        self.history.record_access(id);
        Ok(epic)
    }

    /// Look up a subtask and record the access in the history.
    pub fn get_subtask_by_id(&mut self, id: TaskId) -> Result<Subtask, StoreError> {
        let subtask = self.subtasks.get(&id).cloned().ok_or(StoreError::NotFound(id))?;
        self.history.record_access(id);
        Ok(subtask)
    }

    /// Snapshot of all tasks, ordered by id.
    pub fn tasks(&self) -> Vec<Task> {
        let mut list: Vec<Task> = self.tasks.values().cloned().collect();
        list.sort_by_key(|t| t.id);
        list
    }

    /// Snapshot of all epics, ordered by id.
    pub fn epics(&self) -> Vec<Epic> {
        let mut list: Vec<Epic> = self.epics.values().cloned().collect();
        list.sort_by_key(|e| e.id);
        list
    }

    /// Snapshot of all subtasks, ordered by id.
    pub fn subtasks(&self) -> Vec<Subtask> {
        let mut list: Vec<Subtask> = self.subtasks.values().cloned().collect();
        list.sort_by_key(|s| s.id);
        list
    }

    /// Subtasks of one epic, in the epic's stored (insertion) order.
    pub fn subtasks_of_epic(&self, epic_id: TaskId) -> Result<Vec<Subtask>, StoreError> {
        let epic = self.epics.get(&epic_id).ok_or(StoreError::NotFound(epic_id))?;
        Ok(epic
            .subtask_ids
            .iter()
            .filter_map(|id| self.subtasks.get(id).cloned())
            .collect())
    }

    /// All scheduled tasks and subtasks, ordered by start time ascending.
    pub fn prioritized(&self) -> Vec<WorkItem> {
        self.schedule
            .ids_by_start()
            .into_iter()
            .filter_map(|id| self.resolve(id))
            .collect()
    }

    /// The access history, oldest first, resolved to full records.
    pub fn history(&self) -> Vec<WorkItem> {
        self.history
            .snapshot()
            .into_iter()
            .filter_map(|id| self.resolve(id))
            .collect()
    }

    /// Drop every standalone task, purging the schedule index and history.
    pub fn remove_all_tasks(&mut self) {
        for id in self.tasks.keys() {
            self.schedule.remove(*id);
            self.history.remove(*id);
        }
        self.tasks.clear();
    }

    /// Drop every epic together with all subtasks.
    pub fn remove_all_epics(&mut self) {
        for id in self.epics.keys() {
            self.history.remove(*id);
        }
        self.epics.clear();
        for id in self.subtasks.keys() {
            self.schedule.remove(*id);
            self.history.remove(*id);
        }
        self.subtasks.clear();
    }

    /// Drop every subtask; epics stay and fall back to their empty-set
    /// aggregates.
    pub fn remove_all_subtasks(&mut self) {
        for id in self.subtasks.keys() {
            self.schedule.remove(*id);
            self.history.remove(*id);
        }
        self.subtasks.clear();
        let epic_ids: Vec<TaskId> = self.epics.keys().copied().collect();
        for epic_id in epic_ids {
            if let Some(epic) = self.epics.get_mut(&epic_id) {
                epic.subtask_ids.clear();
            }
            self.recompute_epic(epic_id);
        }
    }

    fn resolve(&self, id: TaskId) -> Option<WorkItem> {
        if let Some(task) = self.tasks.get(&id) {
            return Some(WorkItem::Task(task.clone()));
        }
        if let Some(epic) = self.epics.get(&id) {
            return Some(WorkItem::Epic(epic.clone()));
        }
        self.subtasks.get(&id).map(|s| WorkItem::Subtask(s.clone()))
    }

    fn ensure_no_conflict(
        &self,
        start: Option<DateTime<Utc>>,
        duration: Duration,
        exclude: Option<TaskId>,
    ) -> Result<(), StoreError> {
        if let Some(start) = start
            && self.schedule.conflicts(start, start + duration, exclude)
        {
            return Err(StoreError::ScheduleConflict);
        }
        Ok(())
    }

    fn reindex(&mut self, id: TaskId, start: Option<DateTime<Utc>>, duration: Duration) {
        match start {
            Some(start) => self.schedule.insert(id, start, start + duration),
            None => self.schedule.remove(id),
        }
    }

    /// Re-derive one epic's aggregate fields as a pure fold over its
    /// current subtask set. Always a full recompute: a subtask removal or
    /// status change can move any aggregate in either direction.
    fn recompute_epic(&mut self, epic_id: TaskId) {
        let Some(epic) = self.epics.get(&epic_id) else {
            return;
        };
        let subs: Vec<&Subtask> = epic
            .subtask_ids
            .iter()
            .filter_map(|id| self.subtasks.get(id))
            .collect();

        let status = match subs.first() {
            None => Status::New,
            Some(first) => {
                let first = first.status;
                if subs.iter().all(|s| s.status == first) {
                    first
                } else {
                    Status::InProgress
                }
            }
        };
        let duration = subs.iter().fold(Duration::zero(), |acc, s| acc + s.duration);
        let start_time = subs.iter().filter_map(|s| s.start_time).min();
        let end_time = subs.iter().filter_map(|s| s.end_time()).max();

        if let Some(epic) = self.epics.get_mut(&epic_id) {
            epic.status = status;
            epic.duration = duration;
            epic.start_time = start_time;
            epic.end_time = end_time;
        }
    }

    // ---- persistence hooks (crate-private; used by `storage`) ----

    pub(crate) fn id_seq(&self) -> TaskId {
        self.id_seq
    }

    pub(crate) fn set_id_seq(&mut self, seq: TaskId) {
        self.id_seq = seq;
    }

    /// Insert a reloaded entity as-is, registering scheduled tasks and
    /// subtasks in the schedule index. No id assignment, no conflict
    /// check: the snapshot was consistent when written.
    pub(crate) fn restore_item(&mut self, item: WorkItem) {
        match item {
            WorkItem::Task(task) => {
                self.reindex(task.id, task.start_time, task.duration);
                self.tasks.insert(task.id, task);
            }
            WorkItem::Epic(epic) => {
                self.epics.insert(epic.id, epic);
            }
            WorkItem::Subtask(subtask) => {
                self.reindex(subtask.id, subtask.start_time, subtask.duration);
                self.subtasks.insert(subtask.id, subtask);
            }
        }
    }

    /// Validate each epic's reloaded subtask-id list and re-derive all
    /// aggregates. The saved list order is authoritative: a cross-epic move
    /// appends at the tail, so a lower id can sit after a higher one and
    /// sorting would lose that order. Ids with no matching subtask are
    /// dropped; subtasks pointing at the epic but missing from its list
    /// are appended in id order.
    pub(crate) fn restore_links(&mut self) {
        let epic_ids: Vec<TaskId> = self.epics.keys().copied().collect();
        for epic_id in epic_ids {
            let saved = self
                .epics
                .get(&epic_id)
                .map(|e| e.subtask_ids.clone())
                .unwrap_or_default();
            let mut ids: Vec<TaskId> = saved
                .into_iter()
                .filter(|id| self.subtasks.get(id).is_some_and(|s| s.epic_id == epic_id))
                .collect();
            let mut unlisted: Vec<TaskId> = self
                .subtasks
                .values()
                .filter(|s| s.epic_id == epic_id && !ids.contains(&s.id))
                .map(|s| s.id)
                .collect();
            unlisted.sort_unstable();
            ids.extend(unlisted);
            if let Some(epic) = self.epics.get_mut(&epic_id) {
                epic.subtask_ids = ids;
            }
            self.recompute_epic(epic_id);
        }
    }

    /// Replay a recorded access. Returns false for an id no entity has.
    pub(crate) fn restore_access(&mut self, id: TaskId) -> bool {
        if self.tasks.contains_key(&id) || self.epics.contains_key(&id) || self.subtasks.contains_key(&id) {
            self.history.record_access(id);
            true
        } else {
            false
        }
    }
}
