//! Scheduling index: ordered interval set for conflict detection.
//!
//! Holds the `[start, end)` interval of every scheduled task and subtask
//! (epics are excluded, their window is derived rather than asserted) and
//! answers "does this interval overlap any stored one". Entries are ordered
//! by start time, so a conflict scan is range-bounded: no entry whose start
//! is at or past the query's end can overlap it.

use crate::types::TaskId;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// Ordered collection of scheduled intervals, keyed by start time.
#[derive(Debug, Default)]
pub struct ScheduleIndex {
    /// (start, id) -> end; the id in the key disambiguates equal starts
    by_start: BTreeMap<(DateTime<Utc>, TaskId), DateTime<Utc>>,

    /// id -> interval, for O(log n) removal by identity
    intervals: HashMap<TaskId, (DateTime<Utc>, DateTime<Utc>)>,
}

impl ScheduleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `[start, end)` overlaps any stored interval.
    ///
    /// Intervals are half-open: touching endpoints (`e1 == s2`) do not
    /// overlap, and two zero-length intervals at the same instant do not
    /// overlap. `exclude` skips one entry by id, so that an item updating
    /// into its own slot never conflicts with itself.
    pub fn conflicts(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<TaskId>,
    ) -> bool {
        // Only entries with entry.start < end are candidates; the range
        // bound is the early exit over the start-ordered set.
        self.by_start
            .range(..(end, TaskId::MIN))
            .any(|(&(_, id), &entry_end)| Some(id) != exclude && start < entry_end)
    }

    /// Insert or replace the interval for `id`.
    pub fn insert(&mut self, id: TaskId, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.remove(id);
        self.by_start.insert((start, id), end);
        self.intervals.insert(id, (start, end));
    }

    /// Remove the entry for `id`, if present.
    pub fn remove(&mut self, id: TaskId) {
        if let Some((start, _)) = self.intervals.remove(&id) {
            self.by_start.remove(&(start, id));
        }
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.intervals.contains_key(&id)
    }

    /// Ids of all scheduled items, ordered by start time ascending.
    pub fn ids_by_start(&self) -> Vec<TaskId> {
        self.by_start.keys().map(|&(_, id)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_start.clear();
        self.intervals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, hour, min, 0).unwrap()
    }

    #[test]
    fn test_empty_index_never_conflicts() {
        let index = ScheduleIndex::new();
        assert!(!index.conflicts(at(10, 0), at(11, 0), None));
    }

    #[test]
    fn test_overlapping_intervals_conflict() {
        let mut index = ScheduleIndex::new();
        index.insert(1, at(10, 0), at(10, 30));
        assert!(index.conflicts(at(10, 29), at(10, 45), None));
        assert!(index.conflicts(at(9, 0), at(12, 0), None));
        assert!(index.conflicts(at(10, 10), at(10, 20), None));
    }

    #[test]
    fn test_touching_intervals_do_not_conflict() {
        let mut index = ScheduleIndex::new();
        index.insert(1, at(10, 0), at(10, 30));
        assert!(!index.conflicts(at(10, 30), at(11, 0), None));
        assert!(!index.conflicts(at(9, 0), at(10, 0), None));
    }

    #[test]
    fn test_zero_length_intervals_at_same_instant_do_not_conflict() {
        let mut index = ScheduleIndex::new();
        index.insert(1, at(10, 0), at(10, 0));
        assert!(!index.conflicts(at(10, 0), at(10, 0), None));
    }

    #[test]
    fn test_exclusion_skips_own_entry() {
        let mut index = ScheduleIndex::new();
        index.insert(1, at(10, 0), at(10, 30));
        assert!(index.conflicts(at(10, 0), at(10, 30), None));
        assert!(!index.conflicts(at(10, 0), at(10, 30), Some(1)));
        // other entries still count
        index.insert(2, at(10, 15), at(10, 45));
        assert!(index.conflicts(at(10, 0), at(10, 30), Some(1)));
    }

    #[test]
    fn test_remove_frees_the_slot() {
        let mut index = ScheduleIndex::new();
        index.insert(1, at(10, 0), at(10, 30));
        index.remove(1);
        assert!(!index.conflicts(at(10, 0), at(10, 30), None));
        assert!(index.is_empty());
    }

    #[test]
    fn test_insert_replaces_previous_interval() {
        let mut index = ScheduleIndex::new();
        index.insert(1, at(10, 0), at(10, 30));
        index.insert(1, at(12, 0), at(12, 30));
        assert_eq!(index.len(), 1);
        assert!(!index.conflicts(at(10, 0), at(10, 30), None));
        assert!(index.conflicts(at(12, 0), at(12, 30), None));
    }

    #[test]
    fn test_ids_ordered_by_start() {
        let mut index = ScheduleIndex::new();
        index.insert(1, at(12, 0), at(12, 30));
        index.insert(2, at(9, 0), at(9, 30));
        index.insert(3, at(10, 0), at(10, 30));
        assert_eq!(index.ids_by_start(), vec![2, 3, 1]);
    }

    #[test]
    fn test_equal_starts_both_present() {
        let mut index = ScheduleIndex::new();
        let start = at(10, 0);
        index.insert(1, start, start + Duration::minutes(0));
        index.insert(2, start, start + Duration::minutes(5));
        assert_eq!(index.len(), 2);
        assert_eq!(index.ids_by_start(), vec![1, 2]);
    }
}
