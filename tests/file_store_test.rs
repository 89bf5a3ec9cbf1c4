//! Integration tests for the file-backed store.
//!
//! These tests verify the durability contract end to end:
//! - every mutation (and every view) is persisted immediately
//! - save→load reproduces entity state, epic rollups, history order, and an
//!   id counter past the maximum used id
//! - corrupt files abort the load instead of producing partial state

use chrono::{Duration, NaiveDate, NaiveDateTime};
use helmsman::models::{Entity, EntityId, Epic, SubTask, Task, TaskStatus};
use helmsman::storage::FileStore;
use helmsman::ErrorKind;
use tempfile::TempDir;

fn dt(hour: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 4)
        .unwrap()
        .and_hms_opt(hour, min, 0)
        .unwrap()
}

fn store_in(dir: &TempDir) -> FileStore {
    FileStore::open(dir.path().join("tasks.csv")).unwrap()
}

fn task_at(name: &str, hour: u32, minutes: i64) -> Task {
    Task::scheduled(name, "integration task", Duration::minutes(minutes), dt(hour, 0))
}

fn subtask_at(name: &str, epic_id: EntityId, hour: u32, minutes: i64) -> SubTask {
    SubTask::scheduled(
        name,
        "integration subtask",
        epic_id,
        Duration::minutes(minutes),
        dt(hour, 0),
    )
}

#[test]
fn test_create_writes_file() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    assert!(store.path().exists());

    let text = std::fs::read_to_string(store.path()).unwrap();
    assert!(text.starts_with("id,type,name,status,description"));
}

#[test]
fn test_roundtrip_reproduces_state() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tasks.csv");

    let (t, e, s1, s2) = {
        let mut store = FileStore::create(&path).unwrap();
        let t = store.create_task(task_at("solo", 8, 20)).unwrap();
        let e = store.create_epic(Epic::new("release", "ship v1")).unwrap();
        let s1 = store.create_subtask(subtask_at("build", e, 10, 30)).unwrap();
        let s2 = store.create_subtask(subtask_at("test", e, 12, 45)).unwrap();

        let mut done = subtask_at("build", e, 10, 30);
        done.task.id = s1;
        done.task.status = TaskStatus::Done;
        store.update_subtask(done).unwrap();

        store.get_task(t).unwrap();
        store.get_epic(e).unwrap();
        (t, e, s1, s2)
    };

    let mut reloaded = FileStore::load(&path).unwrap();

    // Entities and fields
    let task = reloaded.get_task(t).unwrap();
    assert_eq!(task.name, "solo");
    assert_eq!(task.duration(), Duration::minutes(20));
    assert_eq!(task.start_time(), Some(dt(8, 0)));
    assert_eq!(task.end_time(), Some(dt(8, 20)));

    // Epic rollup: one DONE, one NEW
    let epic = reloaded.get_epic(e).unwrap();
    assert_eq!(epic.status(), TaskStatus::InProgress);
    assert_eq!(epic.subtask_ids(), &[s1, s2]);
    assert_eq!(epic.start_time(), Some(dt(10, 0)));
    assert_eq!(epic.end_time(), Some(dt(12, 45)));
    assert_eq!(epic.duration(), Some(Duration::minutes(75)));

    assert_eq!(reloaded.get_subtask(s1).unwrap().task.status, TaskStatus::Done);
    assert_eq!(reloaded.get_subtask(s2).unwrap().epic_id(), e);
}

#[test]
fn test_history_order_survives_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tasks.csv");

    let (a, b) = {
        let mut store = FileStore::create(&path).unwrap();
        let a = store.create_task(task_at("a", 8, 10)).unwrap();
        let b = store.create_task(task_at("b", 10, 10)).unwrap();
        store.get_task(a).unwrap();
        store.get_task(b).unwrap();
        store.get_task(a).unwrap();
        (a, b)
    };

    let reloaded = FileStore::load(&path).unwrap();
    let ids: Vec<EntityId> = reloaded.get_history().iter().map(Entity::id).collect();
    assert_eq!(ids, vec![b, a]);
}

#[test]
fn test_id_counter_continues_after_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tasks.csv");

    let max_id = {
        let mut store = FileStore::create(&path).unwrap();
        store.create_task(task_at("a", 8, 10)).unwrap();
        let e = store.create_epic(Epic::new("e", "d")).unwrap();
        store.create_subtask(subtask_at("s", e, 10, 10)).unwrap()
    };

    let mut reloaded = FileStore::load(&path).unwrap();
    let next = reloaded.create_task(task_at("later", 20, 10)).unwrap();
    assert_eq!(next, max_id + 1);
}

#[test]
fn test_overlap_enforced_after_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tasks.csv");

    let a = {
        let mut store = FileStore::create(&path).unwrap();
        store.create_task(task_at("a", 9, 30)).unwrap()
    };

    let mut reloaded = FileStore::load(&path).unwrap();
    let err = reloaded.create_task(task_at("b", 9, 10)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains(&a.to_string()));
}

#[test]
fn test_every_mutation_is_durable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tasks.csv");
    let mut store = FileStore::create(&path).unwrap();

    let t = store.create_task(task_at("a", 8, 10)).unwrap();
    assert_eq!(FileStore::load(&path).unwrap().list_tasks().len(), 1);

    store.delete_task(t).unwrap();
    assert!(FileStore::load(&path).unwrap().list_tasks().is_empty());

    let e = store.create_epic(Epic::new("e", "d")).unwrap();
    store.create_subtask(subtask_at("s", e, 10, 10)).unwrap();
    assert_eq!(FileStore::load(&path).unwrap().list_subtasks().len(), 1);

    store.delete_epic(e).unwrap();
    let reloaded = FileStore::load(&path).unwrap();
    assert!(reloaded.list_epics().is_empty());
    assert!(reloaded.list_subtasks().is_empty());
}

#[test]
fn test_views_are_durable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tasks.csv");
    let mut store = FileStore::create(&path).unwrap();

    let t = store.create_task(task_at("a", 8, 10)).unwrap();
    assert!(FileStore::load(&path).unwrap().get_history().is_empty());

    store.get_task(t).unwrap();
    let reloaded = FileStore::load(&path).unwrap();
    assert_eq!(reloaded.get_history().len(), 1);
}

#[test]
fn test_epic_cascade_is_durable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tasks.csv");
    let mut store = FileStore::create(&path).unwrap();

    let e = store.create_epic(Epic::new("e", "d")).unwrap();
    let s1 = store.create_subtask(subtask_at("s1", e, 9, 10)).unwrap();
    let s2 = store.create_subtask(subtask_at("s2", e, 11, 10)).unwrap();
    store.get_subtask(s1).unwrap();
    store.get_subtask(s2).unwrap();

    store.delete_epic(e).unwrap();

    let reloaded = FileStore::load(&path).unwrap();
    assert!(reloaded.list_subtasks().is_empty());
    assert!(reloaded.get_history().is_empty());
    assert!(reloaded.prioritized().is_empty());
}

#[test]
fn test_load_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let err = FileStore::load(dir.path().join("absent.csv")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
}

#[test]
fn test_load_corrupt_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tasks.csv");
    std::fs::write(&path, "this is not a store file\n").unwrap();

    let err = FileStore::load(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
}

#[test]
fn test_load_truncated_record_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tasks.csv");

    {
        let mut store = FileStore::create(&path).unwrap();
        store.create_task(task_at("a", 8, 10)).unwrap();
    }

    // Chop the record line in half
    let text = std::fs::read_to_string(&path).unwrap();
    let broken: String = text
        .lines()
        .map(|line| {
            if line.starts_with("1,TASK") {
                &line[..line.len() / 2]
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    std::fs::write(&path, broken).unwrap();

    assert!(FileStore::load(&path).is_err());
}

#[test]
fn test_open_reuses_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tasks.csv");

    {
        let mut store = FileStore::open(&path).unwrap();
        store.create_task(task_at("a", 8, 10)).unwrap();
    }

    let store = FileStore::open(&path).unwrap();
    assert_eq!(store.list_tasks().len(), 1);
}

#[test]
fn test_empty_store_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tasks.csv");
    FileStore::create(&path).unwrap();

    let store = FileStore::load(&path).unwrap();
    assert!(store.list_tasks().is_empty());
    assert!(store.list_epics().is_empty());
    assert!(store.list_subtasks().is_empty());
    assert!(store.get_history().is_empty());
    assert!(store.prioritized().is_empty());
}

#[test]
fn test_bulk_deletes_are_durable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tasks.csv");
    let mut store = FileStore::create(&path).unwrap();

    let e = store.create_epic(Epic::new("e", "d")).unwrap();
    store.create_subtask(subtask_at("s", e, 9, 10)).unwrap();
    store.create_task(task_at("t", 11, 10)).unwrap();

    store.delete_all_subtasks().unwrap();
    let reloaded = FileStore::load(&path).unwrap();
    assert!(reloaded.list_subtasks().is_empty());
    assert_eq!(reloaded.list_epics()[0].status(), TaskStatus::New);
    assert_eq!(reloaded.list_epics()[0].duration(), None);

    store.delete_all_epics().unwrap();
    store.delete_all_tasks().unwrap();
    let reloaded = FileStore::load(&path).unwrap();
    assert!(reloaded.list_epics().is_empty());
    assert!(reloaded.list_tasks().is_empty());
}
