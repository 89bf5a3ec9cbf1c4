//! The task graph engine.
//!
//! `TaskEngine` owns all mutable state: the three id-keyed entity stores,
//! the shared id counter, the view history, and the schedule index. Every
//! operation validates first and mutates second, so a failed call leaves the
//! engine untouched.
//!
//! Epics are derived entities: their status and time window are recomputed
//! here after every structural change to their subtasks, and they are never
//! registered in the schedule index.

use crate::history::ViewHistory;
use crate::models::{Entity, EntityId, Epic, SubTask, Task, TaskStatus};
use crate::schedule::ScheduleIndex;
use crate::{Error, Result};
use chrono::{Duration, NaiveDateTime};
use std::collections::HashMap;
use tracing::{debug, warn};

/// In-memory task graph: tasks, epics, subtasks, history, and schedule.
#[derive(Debug, Clone, Default)]
pub struct TaskEngine {
    tasks: HashMap<EntityId, Task>,
    subtasks: HashMap<EntityId, SubTask>,
    epics: HashMap<EntityId, Epic>,
    /// Last id handed out; shared across all entity kinds, never reused
    next_id: EntityId,
    history: ViewHistory,
    schedule: ScheduleIndex,
}

impl TaskEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> EntityId {
        self.next_id += 1;
        self.next_id
    }

    /// Validate a candidate's schedule and return its resolved window.
    ///
    /// `exclude` is the candidate's own id during updates, so a task is
    /// never rejected for overlapping its previous window.
    fn validate_window(
        &self,
        task: &Task,
        exclude: Option<EntityId>,
    ) -> Result<(NaiveDateTime, NaiveDateTime)> {
        let start = task.start_time().ok_or(Error::MissingStartTime)?;
        if task.duration() < Duration::zero() {
            return Err(Error::NegativeDuration);
        }
        let end = start + task.duration();
        if let Some(conflict) = self.schedule.find_overlap(start, end, exclude) {
            return Err(Error::Overlap(conflict));
        }
        Ok((start, end))
    }

    // === Tasks ===

    /// Create a task: validate its window, assign the next id, force status
    /// NEW, and register it in the store and the schedule index.
    ///
    /// Returns the assigned id.
    pub fn create_task(&mut self, mut task: Task) -> Result<EntityId> {
        let (start, end) = self.validate_window(&task, None)?;
        let id = self.alloc_id();
        task.id = id;
        task.status = TaskStatus::New;
        self.schedule.insert(id, start, end);
        self.tasks.insert(id, task);
        debug!(id, "created task");
        Ok(id)
    }

    /// Replace a task's state, re-validating its window against everything
    /// but its own previous entry.
    ///
    /// Upserts: when the target id is not live, the update degrades to a
    /// create and a fresh id is assigned. Returns the id holding the state.
    pub fn update_task(&mut self, task: Task) -> Result<EntityId> {
        let Some(previous) = self.tasks.get(&task.id) else {
            return self.create_task(task);
        };
        let prev_start = previous.start_time();
        let (start, end) = self.validate_window(&task, Some(task.id))?;
        if let Some(prev) = prev_start {
            self.schedule.remove(task.id, prev);
        }
        let id = task.id;
        self.schedule.insert(id, start, end);
        self.tasks.insert(id, task);
        debug!(id, "updated task");
        Ok(id)
    }

    /// Look up a task by id, recording the view in the history.
    pub fn get_task(&mut self, id: EntityId) -> Result<Task> {
        let task = self
            .tasks
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound("task", id))?;
        self.history.record_view(id);
        Ok(task)
    }

    /// All live tasks; no history side effect.
    pub fn list_tasks(&self) -> Vec<Task> {
        self.tasks.values().cloned().collect()
    }

    /// Delete a task, purging its schedule and history entries.
    pub fn delete_task(&mut self, id: EntityId) -> Result<()> {
        let task = self.tasks.remove(&id).ok_or(Error::NotFound("task", id))?;
        if let Some(start) = task.start_time() {
            self.schedule.remove(id, start);
        }
        self.history.forget(id);
        debug!(id, "deleted task");
        Ok(())
    }

    /// Delete every task, purging schedule and history entries.
    pub fn delete_all_tasks(&mut self) {
        for (id, task) in self.tasks.drain() {
            if let Some(start) = task.start_time() {
                self.schedule.remove(id, start);
            }
            self.history.forget(id);
        }
        debug!("deleted all tasks");
    }

    // === Subtasks ===

    /// Create a subtask under its declared epic.
    ///
    /// Validates the window, resolves the parent epic, assigns the next id,
    /// forces status NEW, registers in the store, index, and the parent's
    /// subtask list, and refreshes the parent rollup. Returns the id.
    pub fn create_subtask(&mut self, mut subtask: SubTask) -> Result<EntityId> {
        let (start, end) = self.validate_window(&subtask.task, None)?;
        let epic_id = subtask.epic_id();
        if !self.epics.contains_key(&epic_id) {
            return Err(Error::MissingEpic(epic_id));
        }
        let id = self.alloc_id();
        subtask.task.id = id;
        subtask.task.status = TaskStatus::New;
        if let Some(epic) = self.epics.get_mut(&epic_id) {
            epic.add_subtask_id(id);
        }
        self.schedule.insert(id, start, end);
        self.subtasks.insert(id, subtask);
        self.refresh_epic(epic_id);
        debug!(id, epic_id, "created subtask");
        Ok(id)
    }

    /// Replace a subtask's state; upserts when the target id is not live.
    ///
    /// The parent binding is immutable: an update always stays under the
    /// subtask's original epic, whatever the incoming value declares.
    pub fn update_subtask(&mut self, subtask: SubTask) -> Result<EntityId> {
        let id = subtask.task.id;
        let Some(previous) = self.subtasks.get(&id) else {
            return self.create_subtask(subtask);
        };
        let epic_id = previous.epic_id();
        let prev_start = previous.task.start_time();
        let subtask = subtask.with_epic_id(epic_id);
        let (start, end) = self.validate_window(&subtask.task, Some(id))?;
        if let Some(prev) = prev_start {
            self.schedule.remove(id, prev);
        }
        self.schedule.insert(id, start, end);
        self.subtasks.insert(id, subtask);
        self.refresh_epic(epic_id);
        debug!(id, epic_id, "updated subtask");
        Ok(id)
    }

    /// Look up a subtask by id, recording the view in the history.
    pub fn get_subtask(&mut self, id: EntityId) -> Result<SubTask> {
        let subtask = self
            .subtasks
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound("subtask", id))?;
        self.history.record_view(id);
        Ok(subtask)
    }

    /// All live subtasks; no history side effect.
    pub fn list_subtasks(&self) -> Vec<SubTask> {
        self.subtasks.values().cloned().collect()
    }

    /// The given epic's subtasks, in the epic's list order.
    ///
    /// Unknown epics yield an empty list, and ids that no longer resolve are
    /// skipped rather than failing the whole read.
    pub fn subtasks_of_epic(&self, epic_id: EntityId) -> Vec<SubTask> {
        let Some(epic) = self.epics.get(&epic_id) else {
            return Vec::new();
        };
        epic.subtask_ids()
            .iter()
            .filter_map(|&id| {
                let subtask = self.subtasks.get(&id);
                if subtask.is_none() {
                    warn!(id, epic_id, "epic lists a subtask id that no longer resolves");
                }
                subtask.cloned()
            })
            .collect()
    }

    /// Delete a subtask, detaching it from its parent and refreshing the
    /// parent rollup.
    pub fn delete_subtask(&mut self, id: EntityId) -> Result<()> {
        let subtask = self
            .subtasks
            .remove(&id)
            .ok_or(Error::NotFound("subtask", id))?;
        if let Some(start) = subtask.task.start_time() {
            self.schedule.remove(id, start);
        }
        self.history.forget(id);
        let epic_id = subtask.epic_id();
        if let Some(epic) = self.epics.get_mut(&epic_id) {
            epic.remove_subtask_id(id);
        }
        self.refresh_epic(epic_id);
        debug!(id, epic_id, "deleted subtask");
        Ok(())
    }

    /// Delete every subtask, resetting every epic's list and rollup.
    pub fn delete_all_subtasks(&mut self) {
        for (id, subtask) in self.subtasks.drain() {
            if let Some(start) = subtask.task.start_time() {
                self.schedule.remove(id, start);
            }
            self.history.forget(id);
        }
        let epic_ids: Vec<EntityId> = self.epics.keys().copied().collect();
        for epic_id in epic_ids {
            if let Some(epic) = self.epics.get_mut(&epic_id) {
                epic.clear_subtask_ids();
            }
            self.refresh_epic(epic_id);
        }
        debug!("deleted all subtasks");
    }

    // === Epics ===

    /// Create an epic: assign the next id and force status NEW.
    ///
    /// Epics are never scheduled, so the index is untouched.
    pub fn create_epic(&mut self, mut epic: Epic) -> EntityId {
        let id = self.alloc_id();
        epic.id = id;
        epic.set_status(TaskStatus::New);
        self.epics.insert(id, epic);
        debug!(id, "created epic");
        id
    }

    /// Update an epic's name and description.
    ///
    /// Status, duration, and the time window are rollup-derived and never
    /// accepted from the caller. Upserts when the target id is not live.
    pub fn update_epic(&mut self, epic: Epic) -> EntityId {
        match self.epics.get_mut(&epic.id) {
            Some(stored) => {
                stored.name = epic.name;
                stored.description = epic.description;
                debug!(id = stored.id, "updated epic");
                stored.id
            }
            None => self.create_epic(epic),
        }
    }

    /// Look up an epic by id, recording the view in the history.
    pub fn get_epic(&mut self, id: EntityId) -> Result<Epic> {
        let epic = self
            .epics
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound("epic", id))?;
        self.history.record_view(id);
        Ok(epic)
    }

    /// All live epics; no history side effect.
    pub fn list_epics(&self) -> Vec<Epic> {
        self.epics.values().cloned().collect()
    }

    /// Delete an epic and cascade over every subtask it owns.
    ///
    /// Owned subtasks are purged from their store, the schedule index, and
    /// the history before the epic itself is removed.
    pub fn delete_epic(&mut self, id: EntityId) -> Result<()> {
        let epic = self.epics.remove(&id).ok_or(Error::NotFound("epic", id))?;
        for &sub_id in epic.subtask_ids() {
            if let Some(subtask) = self.subtasks.remove(&sub_id) {
                if let Some(start) = subtask.task.start_time() {
                    self.schedule.remove(sub_id, start);
                }
                self.history.forget(sub_id);
            }
        }
        self.history.forget(id);
        debug!(id, "deleted epic");
        Ok(())
    }

    /// Delete every epic and, with them, every subtask.
    pub fn delete_all_epics(&mut self) {
        for (id, subtask) in self.subtasks.drain() {
            if let Some(start) = subtask.task.start_time() {
                self.schedule.remove(id, start);
            }
            self.history.forget(id);
        }
        for (id, _) in self.epics.drain() {
            self.history.forget(id);
        }
        debug!("deleted all epics");
    }

    // === Views ===

    /// Viewed entities in view order, most recently viewed last.
    pub fn get_history(&self) -> Vec<Entity> {
        self.history
            .ids()
            .into_iter()
            .filter_map(|id| self.resolve(id))
            .collect()
    }

    /// Scheduled tasks and subtasks ordered by start time ascending.
    pub fn prioritized(&self) -> Vec<Entity> {
        self.schedule
            .ids()
            .filter_map(|id| self.resolve(id))
            .collect()
    }

    fn resolve(&self, id: EntityId) -> Option<Entity> {
        if let Some(task) = self.tasks.get(&id) {
            return Some(Entity::Task(task.clone()));
        }
        if let Some(subtask) = self.subtasks.get(&id) {
            return Some(Entity::SubTask(subtask.clone()));
        }
        self.epics.get(&id).map(|epic| Entity::Epic(epic.clone()))
    }

    // === Epic rollups ===

    /// Recompute the epic's status and time window from its live subtasks.
    fn refresh_epic(&mut self, epic_id: EntityId) {
        let (status, window) = {
            let Some(epic) = self.epics.get(&epic_id) else {
                return;
            };
            let subtasks: Vec<&SubTask> = epic
                .subtask_ids()
                .iter()
                .filter_map(|id| self.subtasks.get(id))
                .collect();
            (rollup_status(&subtasks), rollup_window(&subtasks))
        };
        if let Some(epic) = self.epics.get_mut(&epic_id) {
            epic.set_status(status);
            epic.set_window(window);
        }
    }

    // === Load-time hooks (trusted input, validation bypassed) ===

    pub(crate) fn insert_task_raw(&mut self, task: Task) {
        if let (Some(start), Some(end)) = (task.start_time(), task.end_time()) {
            self.schedule.insert(task.id, start, end);
        }
        self.tasks.insert(task.id, task);
    }

    pub(crate) fn insert_subtask_raw(&mut self, subtask: SubTask) {
        if let (Some(start), Some(end)) = (subtask.task.start_time(), subtask.task.end_time()) {
            self.schedule.insert(subtask.task.id, start, end);
        }
        self.subtasks.insert(subtask.task.id, subtask);
    }

    pub(crate) fn insert_epic_raw(&mut self, epic: Epic) {
        self.epics.insert(epic.id, epic);
    }

    /// Re-link every subtask into its parent's list, in id (creation) order,
    /// then recompute every rollup. Subtasks whose parent vanished are left
    /// unlinked.
    pub(crate) fn relink_subtasks(&mut self) {
        let mut sub_ids: Vec<EntityId> = self.subtasks.keys().copied().collect();
        sub_ids.sort_unstable();
        for id in sub_ids {
            let Some(epic_id) = self.subtasks.get(&id).map(|s| s.epic_id()) else {
                continue;
            };
            match self.epics.get_mut(&epic_id) {
                Some(epic) => epic.add_subtask_id(id),
                None => warn!(id, epic_id, "subtask references a missing epic"),
            }
        }
        let epic_ids: Vec<EntityId> = self.epics.keys().copied().collect();
        for epic_id in epic_ids {
            self.refresh_epic(epic_id);
        }
    }

    pub(crate) fn set_next_id(&mut self, next_id: EntityId) {
        self.next_id = next_id;
    }

    /// Replay a persisted view; fails when the id resolves in no store.
    pub(crate) fn replay_view(&mut self, id: EntityId) -> Result<()> {
        if self.resolve(id).is_none() {
            return Err(Error::CorruptRecord(format!(
                "history references unknown id {}",
                id
            )));
        }
        self.history.record_view(id);
        Ok(())
    }
}

/// NEW when there are no subtasks or all are NEW, DONE when all of at least
/// one are DONE, IN_PROGRESS otherwise.
fn rollup_status(subtasks: &[&SubTask]) -> TaskStatus {
    if subtasks.is_empty() {
        return TaskStatus::New;
    }
    let all_new = subtasks.iter().all(|s| s.task.status == TaskStatus::New);
    if all_new {
        return TaskStatus::New;
    }
    let all_done = subtasks.iter().all(|s| s.task.status == TaskStatus::Done);
    if all_done {
        return TaskStatus::Done;
    }
    TaskStatus::InProgress
}

/// Earliest start, latest end, and summed duration; `None` with no subtasks.
fn rollup_window(subtasks: &[&SubTask]) -> Option<(NaiveDateTime, NaiveDateTime, Duration)> {
    let start = subtasks.iter().filter_map(|s| s.task.start_time()).min()?;
    let end = subtasks.iter().filter_map(|s| s.task.end_time()).max()?;
    let duration = subtasks
        .iter()
        .fold(Duration::zero(), |sum, s| sum + s.task.duration());
    Some((start, end, duration))
}
