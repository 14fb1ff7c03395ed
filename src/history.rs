//! History tracker: recency-ordered, duplicate-free record of accessed ids.
//!
//! Implemented as a doubly linked list of nodes living in a slot arena,
//! plus an id -> slot map. Re-accessing an id unlinks its old node and
//! appends a fresh one at the tail, so both the dedup move-to-tail and
//! removal on delete are O(1) without pointer-chasing ownership cycles.

use crate::types::TaskId;
use std::collections::HashMap;

#[derive(Debug)]
struct Node {
    id: TaskId,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Unbounded access history, oldest first.
#[derive(Debug, Default)]
pub struct HistoryTracker {
    /// Slot arena; `None` slots are free and tracked in `free`
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    /// id -> occupied slot
    index: HashMap<TaskId, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl HistoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an access. If the id is already present its old position is
    /// discarded first, so the net effect is a move to the most-recent end.
    pub fn record_access(&mut self, id: TaskId) {
        self.remove(id);

        let node = Node {
            id,
            prev: self.tail,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };

        if let Some(old_tail) = self.tail {
            if let Some(tail_node) = self.nodes[old_tail].as_mut() {
                tail_node.next = Some(slot);
            }
        } else {
            self.head = Some(slot);
        }
        self.tail = Some(slot);
        self.index.insert(id, slot);
    }

    /// Unlink the node for `id`; no-op if absent. Returns whether an
    /// entry was removed.
    pub fn remove(&mut self, id: TaskId) -> bool {
        let Some(slot) = self.index.remove(&id) else {
            return false;
        };
        let Some(node) = self.nodes[slot].take() else {
            return false;
        };

        match node.prev {
            Some(prev) => {
                if let Some(prev_node) = self.nodes[prev].as_mut() {
                    prev_node.next = node.next;
                }
            }
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => {
                if let Some(next_node) = self.nodes[next].as_mut() {
                    next_node.prev = node.prev;
                }
            }
            None => self.tail = node.prev,
        }

        self.free.push(slot);
        true
    }

    /// Independent copy of the ordered ids, oldest to newest.
    pub fn snapshot(&self) -> Vec<TaskId> {
        let mut ids = Vec::with_capacity(self.index.len());
        let mut current = self.head;
        while let Some(slot) = current {
            let Some(node) = self.nodes[slot].as_ref() else {
                break;
            };
            ids.push(node.id);
            current = node.next;
        }
        ids
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }
}
