//! Durable storage for the task graph engine.
//!
//! `FileStore` wraps a [`TaskEngine`] and a single flat file: every
//! successful mutation is followed by a full rewrite of the file, and
//! startup reconstructs the engine from it. The file layout is defined in
//! [`codec`].
//!
//! Views (`get_task` and friends) also trigger a save, because they reorder
//! the history and the history is persisted state.
//!
//! A failed save is reported to the caller but does not roll back the
//! in-memory mutation that triggered it; a failed load aborts startup
//! entirely, never yielding a partially loaded store.

pub mod codec;

use crate::engine::TaskEngine;
use crate::models::{Entity, EntityId, Epic, SubTask, Task};
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A task graph engine persisted to one flat file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    engine: TaskEngine,
}

impl FileStore {
    /// Create a fresh store, writing an empty file at `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            path: path.into(),
            engine: TaskEngine::new(),
        };
        store.save()?;
        info!(path = %store.path.display(), "created store");
        Ok(store)
    }

    /// Load a store from an existing file.
    ///
    /// Fails on I/O errors or malformed content; the engine never comes up
    /// half-loaded.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let text = fs::read_to_string(&path)?;
        let engine = codec::decode(&text)?;
        info!(path = %path.display(), "loaded store");
        Ok(Self { path, engine })
    }

    /// Load the file at `path` if it exists, otherwise create it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            Self::load(path)
        } else {
            Self::create(path)
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read access to the underlying engine.
    pub fn engine(&self) -> &TaskEngine {
        &self.engine
    }

    fn save(&self) -> Result<()> {
        fs::write(&self.path, codec::encode(&self.engine))?;
        debug!(path = %self.path.display(), "saved store");
        Ok(())
    }

    // === Tasks ===

    pub fn create_task(&mut self, task: Task) -> Result<EntityId> {
        let id = self.engine.create_task(task)?;
        self.save()?;
        Ok(id)
    }

    pub fn update_task(&mut self, task: Task) -> Result<EntityId> {
        let id = self.engine.update_task(task)?;
        self.save()?;
        Ok(id)
    }

    pub fn get_task(&mut self, id: EntityId) -> Result<Task> {
        let task = self.engine.get_task(id)?;
        self.save()?;
        Ok(task)
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.engine.list_tasks()
    }

    pub fn delete_task(&mut self, id: EntityId) -> Result<()> {
        self.engine.delete_task(id)?;
        self.save()
    }

    pub fn delete_all_tasks(&mut self) -> Result<()> {
        self.engine.delete_all_tasks();
        self.save()
    }

    // === Subtasks ===

    pub fn create_subtask(&mut self, subtask: SubTask) -> Result<EntityId> {
        let id = self.engine.create_subtask(subtask)?;
        self.save()?;
        Ok(id)
    }

    pub fn update_subtask(&mut self, subtask: SubTask) -> Result<EntityId> {
        let id = self.engine.update_subtask(subtask)?;
        self.save()?;
        Ok(id)
    }

    pub fn get_subtask(&mut self, id: EntityId) -> Result<SubTask> {
        let subtask = self.engine.get_subtask(id)?;
        self.save()?;
        Ok(subtask)
    }

    pub fn list_subtasks(&self) -> Vec<SubTask> {
        self.engine.list_subtasks()
    }

    pub fn subtasks_of_epic(&self, epic_id: EntityId) -> Vec<SubTask> {
        self.engine.subtasks_of_epic(epic_id)
    }

    pub fn delete_subtask(&mut self, id: EntityId) -> Result<()> {
        self.engine.delete_subtask(id)?;
        self.save()
    }

    pub fn delete_all_subtasks(&mut self) -> Result<()> {
        self.engine.delete_all_subtasks();
        self.save()
    }

    // === Epics ===

    pub fn create_epic(&mut self, epic: Epic) -> Result<EntityId> {
        let id = self.engine.create_epic(epic);
        self.save()?;
        Ok(id)
    }

    pub fn update_epic(&mut self, epic: Epic) -> Result<EntityId> {
        let id = self.engine.update_epic(epic);
        self.save()?;
        Ok(id)
    }

    pub fn get_epic(&mut self, id: EntityId) -> Result<Epic> {
        let epic = self.engine.get_epic(id)?;
        self.save()?;
        Ok(epic)
    }

    pub fn list_epics(&self) -> Vec<Epic> {
        self.engine.list_epics()
    }

    pub fn delete_epic(&mut self, id: EntityId) -> Result<()> {
        self.engine.delete_epic(id)?;
        self.save()
    }

    pub fn delete_all_epics(&mut self) -> Result<()> {
        self.engine.delete_all_epics();
        self.save()
    }

    // === Views ===

    pub fn get_history(&self) -> Vec<Entity> {
        self.engine.get_history()
    }

    pub fn prioritized(&self) -> Vec<Entity> {
        self.engine.prioritized()
    }
}
