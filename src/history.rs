//! Recency-ordered view history.
//!
//! `ViewHistory` keeps the ids of viewed entities in view order, most recent
//! last, with each id appearing at most once: re-viewing an id moves it to
//! the tail. Record, forget, and re-link are all O(1).
//!
//! The list is an arena of index-linked nodes with a free list, so the
//! doubly-linked structure needs no reference-counted pointer cycles. The
//! tracker stores ids only; callers resolve them against their stores, so a
//! listed view always reflects the entity's current state.

use crate::models::EntityId;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Node {
    id: EntityId,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Deduplicated, recency-ordered log of viewed entity ids.
#[derive(Debug, Clone, Default)]
pub struct ViewHistory {
    /// Node arena; slots on the free list are garbage
    nodes: Vec<Node>,
    /// Recycled arena slots
    free: Vec<usize>,
    /// Maps an entity id to its arena slot
    index: HashMap<EntityId, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl ViewHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a view of `id`, moving it to the most-recent position.
    ///
    /// If the id is already present its node is unlinked first, so each id
    /// appears at most once.
    pub fn record_view(&mut self, id: EntityId) {
        if let Some(&slot) = self.index.get(&id) {
            self.unlink(slot);
            self.free.push(slot);
            self.index.remove(&id);
        }
        self.link_last(id);
    }

    /// Drop `id` from the history; no-op when absent.
    pub fn forget(&mut self, id: EntityId) {
        if let Some(slot) = self.index.remove(&id) {
            self.unlink(slot);
            self.free.push(slot);
        }
    }

    /// Ids in view order, most recently viewed last.
    pub fn ids(&self) -> Vec<EntityId> {
        let mut result = Vec::with_capacity(self.index.len());
        let mut current = self.head;
        while let Some(slot) = current {
            result.push(self.nodes[slot].id);
            current = self.nodes[slot].next;
        }
        result
    }

    /// Number of distinct ids in the history.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    fn link_last(&mut self, id: EntityId) {
        let node = Node {
            id,
            prev: self.tail,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        match self.tail {
            Some(old_tail) => self.nodes[old_tail].next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.index.insert(id, slot);
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
    }
}
