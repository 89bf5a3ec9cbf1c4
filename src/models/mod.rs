//! Data models for Helmsman entities.
//!
//! This module defines the core data structures:
//! - `Task` - Flat work items with a status and a scheduled time window
//! - `Epic` - Container items whose status and window are derived from subtasks
//! - `SubTask` - Work items owned by exactly one epic
//! - `Entity` - Any of the three, for heterogeneous views (history, schedule)

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for any tracked entity.
///
/// Ids are drawn from one monotonically increasing counter shared by tasks,
/// epics, and subtasks, and are never reused. `0` means "not yet assigned".
pub type EntityId = u64;

/// Task status in the workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    New,
    InProgress,
    Done,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::New => "NEW",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Done => "DONE",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(TaskStatus::New),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "DONE" => Ok(TaskStatus::Done),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

/// Serde helper encoding `chrono::Duration` as an integer count of minutes.
pub mod duration_minutes {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(value.num_minutes())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let minutes = i64::deserialize(deserializer)?;
        Ok(Duration::minutes(minutes))
    }

    /// Variant for `Option<Duration>` fields.
    pub mod opt {
        use chrono::Duration;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(d) => serializer.serialize_some(&d.num_minutes()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let minutes = Option::<i64>::deserialize(deserializer)?;
            Ok(minutes.map(Duration::minutes))
        }
    }
}

/// A flat work item with a scheduled time window.
///
/// `end_time` is derived: it is recomputed the moment `duration` or
/// `start_time` changes, and cleared when `start_time` is cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, assigned once by the engine
    pub id: EntityId,

    /// Task name
    pub name: String,

    /// Detailed description
    pub description: String,

    /// Current status
    #[serde(default)]
    pub status: TaskStatus,

    /// Scheduled span, in whole minutes on the wire
    #[serde(with = "duration_minutes")]
    duration: Duration,

    /// Scheduled start
    #[serde(default)]
    start_time: Option<NaiveDateTime>,

    /// Derived end: `start_time + duration`
    #[serde(default)]
    end_time: Option<NaiveDateTime>,
}

impl Task {
    /// Create a new unscheduled task.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: description.into(),
            status: TaskStatus::default(),
            duration: Duration::zero(),
            start_time: None,
            end_time: None,
        }
    }

    /// Create a task with a schedule already set.
    pub fn scheduled(
        name: impl Into<String>,
        description: impl Into<String>,
        duration: Duration,
        start_time: NaiveDateTime,
    ) -> Self {
        let mut task = Self::new(name, description);
        task.set_duration(duration);
        task.set_start_time(Some(start_time));
        task
    }

    /// Scheduled span of this task.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Scheduled start, if set.
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.start_time
    }

    /// Derived end of the time window, if scheduled.
    pub fn end_time(&self) -> Option<NaiveDateTime> {
        self.end_time
    }

    /// Set the span and recompute the end immediately.
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
        self.recompute_end();
    }

    /// Set or clear the start and recompute the end immediately.
    pub fn set_start_time(&mut self, start_time: Option<NaiveDateTime>) {
        self.start_time = start_time;
        self.recompute_end();
    }

    fn recompute_end(&mut self) {
        self.end_time = self.start_time.map(|start| start + self.duration);
    }
}

// Equality is by id alone.
impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Task {}

/// A work item owned by exactly one epic.
///
/// The owning epic is fixed at creation and never reparented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    /// The underlying task fields
    #[serde(flatten)]
    pub task: Task,

    /// Id of the owning epic
    epic_id: EntityId,
}

impl SubTask {
    /// Create a new unscheduled subtask under the given epic.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        epic_id: EntityId,
    ) -> Self {
        Self {
            task: Task::new(name, description),
            epic_id,
        }
    }

    /// Create a subtask with a schedule already set.
    pub fn scheduled(
        name: impl Into<String>,
        description: impl Into<String>,
        epic_id: EntityId,
        duration: Duration,
        start_time: NaiveDateTime,
    ) -> Self {
        Self {
            task: Task::scheduled(name, description, duration, start_time),
            epic_id,
        }
    }

    /// Id of the owning epic.
    pub fn epic_id(&self) -> EntityId {
        self.epic_id
    }

    /// Rebind to `epic_id`, consuming self.
    ///
    /// Crate-internal: the engine uses this to pin an updated subtask to its
    /// original parent, since subtasks are never reparented.
    pub(crate) fn with_epic_id(mut self, epic_id: EntityId) -> Self {
        self.epic_id = epic_id;
        self
    }
}

impl PartialEq for SubTask {
    fn eq(&self, other: &Self) -> bool {
        self.task.id == other.task.id
    }
}

impl Eq for SubTask {}

/// A container item whose status and time window are derived from its
/// subtasks.
///
/// Only `name` and `description` are externally mutable. The rollup fields
/// (`status`, `duration`, `start_time`, `end_time`) and the subtask list are
/// written exclusively by the engine, which recomputes them after every
/// structural change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epic {
    /// Unique identifier, assigned once by the engine
    pub id: EntityId,

    /// Epic name
    pub name: String,

    /// Detailed description
    pub description: String,

    /// Rollup status over the owned subtasks
    #[serde(default)]
    status: TaskStatus,

    /// Owned subtask ids, in creation order
    #[serde(default)]
    subtask_ids: Vec<EntityId>,

    /// Sum of subtask durations; unset with zero subtasks
    #[serde(with = "duration_minutes::opt", default)]
    duration: Option<Duration>,

    /// Earliest subtask start; unset with zero subtasks
    #[serde(default)]
    start_time: Option<NaiveDateTime>,

    /// Latest subtask end; unset with zero subtasks
    #[serde(default)]
    end_time: Option<NaiveDateTime>,
}

impl Epic {
    /// Create a new empty epic.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: description.into(),
            status: TaskStatus::default(),
            subtask_ids: Vec::new(),
            duration: None,
            start_time: None,
            end_time: None,
        }
    }

    /// Rollup status over the owned subtasks.
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Owned subtask ids, in creation order.
    pub fn subtask_ids(&self) -> &[EntityId] {
        &self.subtask_ids
    }

    /// Sum of subtask durations, if the epic has any subtasks.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Earliest subtask start, if the epic has any subtasks.
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.start_time
    }

    /// Latest subtask end, if the epic has any subtasks.
    pub fn end_time(&self) -> Option<NaiveDateTime> {
        self.end_time
    }

    pub(crate) fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
    }

    pub(crate) fn add_subtask_id(&mut self, id: EntityId) {
        self.subtask_ids.push(id);
    }

    pub(crate) fn remove_subtask_id(&mut self, id: EntityId) {
        self.subtask_ids.retain(|&sub| sub != id);
    }

    pub(crate) fn clear_subtask_ids(&mut self) {
        self.subtask_ids.clear();
    }

    /// Install or clear the derived time window in one step.
    pub(crate) fn set_window(
        &mut self,
        window: Option<(NaiveDateTime, NaiveDateTime, Duration)>,
    ) {
        match window {
            Some((start, end, duration)) => {
                self.start_time = Some(start);
                self.end_time = Some(end);
                self.duration = Some(duration);
            }
            None => {
                self.start_time = None;
                self.end_time = None;
                self.duration = None;
            }
        }
    }
}

impl PartialEq for Epic {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Epic {}

/// Any tracked entity, for heterogeneous views such as the history and the
/// prioritized schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Entity {
    #[serde(rename = "TASK")]
    Task(Task),
    #[serde(rename = "EPIC")]
    Epic(Epic),
    #[serde(rename = "SUBTASK")]
    SubTask(SubTask),
}

impl Entity {
    /// Id of the wrapped entity.
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Task(task) => task.id,
            Entity::Epic(epic) => epic.id,
            Entity::SubTask(subtask) => subtask.task.id,
        }
    }

    /// Name of the wrapped entity.
    pub fn name(&self) -> &str {
        match self {
            Entity::Task(task) => &task.name,
            Entity::Epic(epic) => &epic.name,
            Entity::SubTask(subtask) => &subtask.task.name,
        }
    }
}
