//! Start-time-ordered schedule with overlap detection.
//!
//! `ScheduleIndex` orders the scheduled tasks and subtasks by start time and
//! answers the overlap question used by create/update validation. Epics are
//! never indexed; their windows are derived, not scheduled.

use crate::models::EntityId;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Index of scheduled time windows, ordered by start time.
///
/// Keys are `(start, id)` pairs: ties on the start instant fall back to id
/// order, so the traversal order is stable and two entries sharing an exact
/// start never displace each other.
#[derive(Debug, Clone, Default)]
pub struct ScheduleIndex {
    /// `(start, id)` -> end of the window
    windows: BTreeMap<(NaiveDateTime, EntityId), NaiveDateTime>,
}

impl ScheduleIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a window for `id`.
    pub fn insert(&mut self, id: EntityId, start: NaiveDateTime, end: NaiveDateTime) {
        self.windows.insert((start, id), end);
    }

    /// Drop the window registered for `id` at `start`; no-op when absent.
    pub fn remove(&mut self, id: EntityId, start: NaiveDateTime) {
        self.windows.remove(&(start, id));
    }

    /// Remove all windows.
    pub fn clear(&mut self) {
        self.windows.clear();
    }

    /// Indexed ids, ordered by start time ascending (then id).
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.windows.keys().map(|&(_, id)| id)
    }

    /// Number of indexed windows.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Find a window overlapping `[start, end]`, ignoring `exclude`.
    ///
    /// Windows are closed intervals: two windows that merely touch at an
    /// endpoint count as overlapping. Returns the id of the first conflict
    /// in index order.
    pub fn find_overlap(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude: Option<EntityId>,
    ) -> Option<EntityId> {
        self.windows
            .iter()
            .filter(|&(&(_, id), _)| Some(id) != exclude)
            .find(|&(&(other_start, _), &other_end)| start <= other_end && other_start <= end)
            .map(|(&(_, id), _)| id)
    }
}
