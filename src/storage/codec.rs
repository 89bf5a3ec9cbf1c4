//! Line-oriented codec between engine state and the flat store text.
//!
//! Layout: one header line, one record line per entity, a blank separator
//! line, then one line of history ids in view order (empty when the history
//! is empty).
//!
//! Record tuples, comma-joined:
//!
//! ```text
//! {id},TASK,{name},{status},{description},{minutes},{start}
//! {id},EPIC,{name},{status},{description},{minutes|},{start|}
//! {id},SUBTASK,{name},{status},{description},{epic_id},{minutes},{start}
//! ```
//!
//! Durations are whole minutes; starts are ISO-8601 local date-times. Epic
//! rollup columns are written for uniform record width but ignored on
//! decode, since rollups are recomputed from the relinked subtasks. The
//! decoder trusts the file: records go straight into the stores and the
//! schedule index with no overlap re-validation. Any malformed record
//! aborts the whole load; a partially loaded engine is never returned.

use crate::engine::TaskEngine;
use crate::models::{EntityId, Epic, SubTask, Task, TaskStatus};
use crate::{Error, Result};
use chrono::{Duration, NaiveDateTime};

/// First line of every store file.
pub const FILE_HEADER: &str = "id,type,name,status,description,epic,duration,start_time";

const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Serialize the engine's full state to store text.
///
/// Records are written in id order per kind, so equivalent engines encode
/// to identical text.
pub fn encode(engine: &TaskEngine) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(FILE_HEADER);
    out.push('\n');

    let mut tasks = engine.list_tasks();
    tasks.sort_by_key(|task| task.id);
    for task in &tasks {
        out.push_str(&format!(
            "{},TASK,{},{},{},{},{}\n",
            task.id,
            task.name,
            task.status,
            task.description,
            task.duration().num_minutes(),
            fmt_start(task.start_time()),
        ));
    }

    let mut epics = engine.list_epics();
    epics.sort_by_key(|epic| epic.id);
    for epic in &epics {
        out.push_str(&format!(
            "{},EPIC,{},{},{},{},{}\n",
            epic.id,
            epic.name,
            epic.status(),
            epic.description,
            epic.duration()
                .map(|d| d.num_minutes().to_string())
                .unwrap_or_default(),
            fmt_start(epic.start_time()),
        ));
    }

    let mut subtasks = engine.list_subtasks();
    subtasks.sort_by_key(|subtask| subtask.task.id);
    for subtask in &subtasks {
        out.push_str(&format!(
            "{},SUBTASK,{},{},{},{},{},{}\n",
            subtask.task.id,
            subtask.task.name,
            subtask.task.status,
            subtask.task.description,
            subtask.epic_id(),
            subtask.task.duration().num_minutes(),
            fmt_start(subtask.task.start_time()),
        ));
    }

    out.push('\n');

    let history: Vec<String> = engine
        .get_history()
        .iter()
        .map(|entity| entity.id().to_string())
        .collect();
    out.push_str(&history.join(","));
    out.push('\n');

    out
}

/// Reconstruct an engine from store text.
///
/// Inserts records directly, re-links subtasks into their parents in id
/// (creation) order, recomputes every epic rollup, floors the id counter at
/// the maximum id seen, then replays the history line.
pub fn decode(input: &str) -> Result<TaskEngine> {
    let mut lines = input.lines();
    match lines.next() {
        Some(header) if header == FILE_HEADER => {}
        other => {
            return Err(Error::CorruptRecord(format!(
                "bad or missing header: {:?}",
                other.unwrap_or("")
            )));
        }
    }

    let mut engine = TaskEngine::new();
    let mut max_id: EntityId = 0;
    loop {
        let Some(line) = lines.next() else {
            return Err(Error::CorruptRecord(
                "missing blank separator before history".to_string(),
            ));
        };
        if line.is_empty() {
            break;
        }
        let id = decode_record(&mut engine, line)?;
        max_id = max_id.max(id);
    }

    engine.relink_subtasks();
    engine.set_next_id(max_id);

    let history_line = lines.next().unwrap_or("");
    for part in history_line.split(',').filter(|part| !part.is_empty()) {
        let id: EntityId = part
            .parse()
            .map_err(|_| Error::CorruptRecord(format!("bad history id: {}", part)))?;
        engine.replay_view(id)?;
    }

    Ok(engine)
}

fn fmt_start(start: Option<NaiveDateTime>) -> String {
    start
        .map(|s| s.format(DATE_TIME_FORMAT).to_string())
        .unwrap_or_default()
}

fn corrupt(line: &str, reason: &str) -> Error {
    Error::CorruptRecord(format!("{}: {}", reason, line))
}

fn parse_id(field: &str, line: &str) -> Result<EntityId> {
    field.parse().map_err(|_| corrupt(line, "bad id"))
}

fn parse_status(field: &str, line: &str) -> Result<TaskStatus> {
    field.parse().map_err(|_| corrupt(line, "bad status"))
}

fn parse_minutes(field: &str, line: &str) -> Result<Duration> {
    let minutes: i64 = field.parse().map_err(|_| corrupt(line, "bad duration"))?;
    Ok(Duration::minutes(minutes))
}

fn parse_start(field: &str, line: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(field, DATE_TIME_FORMAT)
        .map_err(|_| corrupt(line, "bad start time"))
}

/// Decode one record line into the engine; returns the record's id.
fn decode_record(engine: &mut TaskEngine, line: &str) -> Result<EntityId> {
    let fields: Vec<&str> = line.split(',').collect();
    let tag = *fields.get(1).ok_or_else(|| corrupt(line, "missing type tag"))?;
    match tag {
        "TASK" => {
            let [id, _, name, status, description, duration, start] = fields[..] else {
                return Err(corrupt(line, "wrong field count for TASK"));
            };
            let mut task = Task::scheduled(
                name,
                description,
                parse_minutes(duration, line)?,
                parse_start(start, line)?,
            );
            task.id = parse_id(id, line)?;
            task.status = parse_status(status, line)?;
            let task_id = task.id;
            engine.insert_task_raw(task);
            Ok(task_id)
        }
        "EPIC" => {
            // Rollup columns are present but recomputed after relinking
            let [id, _, name, _, description, _, _] = fields[..] else {
                return Err(corrupt(line, "wrong field count for EPIC"));
            };
            let mut epic = Epic::new(name, description);
            epic.id = parse_id(id, line)?;
            let epic_id = epic.id;
            engine.insert_epic_raw(epic);
            Ok(epic_id)
        }
        "SUBTASK" => {
            let [id, _, name, status, description, epic_id, duration, start] = fields[..] else {
                return Err(corrupt(line, "wrong field count for SUBTASK"));
            };
            let mut subtask = SubTask::scheduled(
                name,
                description,
                parse_id(epic_id, line)?,
                parse_minutes(duration, line)?,
                parse_start(start, line)?,
            );
            subtask.task.id = parse_id(id, line)?;
            subtask.task.status = parse_status(status, line)?;
            let sub_id = subtask.task.id;
            engine.insert_subtask_raw(subtask);
            Ok(sub_id)
        }
        _ => Err(corrupt(line, "unknown type tag")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entity;
    use chrono::NaiveDate;

    fn dt(hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 3)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    fn populated_engine() -> TaskEngine {
        let mut engine = TaskEngine::new();
        let t = engine
            .create_task(Task::scheduled(
                "solo",
                "standalone work",
                Duration::minutes(20),
                dt(9, 0),
            ))
            .unwrap();
        let e = engine.create_epic(Epic::new("release", "v1"));
        let s = engine
            .create_subtask(SubTask::scheduled(
                "step",
                "first step",
                e,
                Duration::minutes(30),
                dt(11, 0),
            ))
            .unwrap();
        engine.get_subtask(s).unwrap();
        engine.get_task(t).unwrap();
        engine.get_epic(e).unwrap();
        engine
    }

    #[test]
    fn test_encode_shape() {
        let text = encode(&populated_engine());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], FILE_HEADER);
        assert_eq!(lines[1], "1,TASK,solo,NEW,standalone work,20,2026-03-03T09:00:00");
        assert_eq!(lines[2], "2,EPIC,release,NEW,v1,30,2026-03-03T11:00:00");
        assert_eq!(lines[3], "3,SUBTASK,step,NEW,first step,2,30,2026-03-03T11:00:00");
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "3,1,2");
    }

    #[test]
    fn test_encode_empty_engine() {
        let text = encode(&TaskEngine::new());
        assert_eq!(text, format!("{}\n\n\n", FILE_HEADER));
    }

    #[test]
    fn test_roundtrip_preserves_state() {
        let original = populated_engine();
        let restored = decode(&encode(&original)).unwrap();

        // Same text means same entities, rollups, and history order
        assert_eq!(encode(&restored), encode(&original));

        let epic = restored.list_epics().pop().unwrap();
        assert_eq!(epic.subtask_ids(), &[3]);
        assert_eq!(epic.duration(), Some(Duration::minutes(30)));
        assert_eq!(epic.start_time(), Some(dt(11, 0)));
        assert_eq!(epic.end_time(), Some(dt(11, 30)));
    }

    #[test]
    fn test_roundtrip_restores_id_counter() {
        let mut restored = decode(&encode(&populated_engine())).unwrap();
        let next = restored
            .create_task(Task::scheduled(
                "later",
                "after reload",
                Duration::minutes(5),
                dt(15, 0),
            ))
            .unwrap();
        assert_eq!(next, 4);
    }

    #[test]
    fn test_roundtrip_restores_schedule_index() {
        let mut restored = decode(&encode(&populated_engine())).unwrap();

        // Reloaded windows still defend their slots
        let err = restored
            .create_task(Task::scheduled(
                "clash",
                "overlaps the subtask",
                Duration::minutes(10),
                dt(11, 10),
            ))
            .unwrap_err();
        assert!(matches!(err, Error::Overlap(3)));
    }

    #[test]
    fn test_decode_empty_history() {
        let text = format!(
            "{}\n1,TASK,a,NEW,b,10,2026-03-03T09:00:00\n\n\n",
            FILE_HEADER
        );
        let engine = decode(&text).unwrap();
        assert!(engine.get_history().is_empty());
        assert_eq!(engine.list_tasks().len(), 1);
    }

    #[test]
    fn test_decode_rejects_bad_header() {
        assert!(decode("id,name\n\n\n").is_err());
        assert!(decode("").is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        let text = format!("{}\n1,BUG,a,NEW,b,10,2026-03-03T09:00:00\n\n\n", FILE_HEADER);
        let err = decode(&text).unwrap_err();
        assert!(matches!(err, Error::CorruptRecord(_)));
    }

    #[test]
    fn test_decode_rejects_wrong_field_count() {
        let text = format!("{}\n1,TASK,a,NEW,b,10\n\n\n", FILE_HEADER);
        assert!(decode(&text).is_err());
    }

    #[test]
    fn test_decode_rejects_unparsable_fields() {
        let bad_duration = format!(
            "{}\n1,TASK,a,NEW,b,soon,2026-03-03T09:00:00\n\n\n",
            FILE_HEADER
        );
        assert!(decode(&bad_duration).is_err());

        let bad_start = format!("{}\n1,TASK,a,NEW,b,10,yesterday\n\n\n", FILE_HEADER);
        assert!(decode(&bad_start).is_err());

        let bad_status = format!(
            "{}\n1,TASK,a,SOMEDAY,b,10,2026-03-03T09:00:00\n\n\n",
            FILE_HEADER
        );
        assert!(decode(&bad_status).is_err());
    }

    #[test]
    fn test_decode_rejects_missing_separator() {
        let text = format!("{}\n1,TASK,a,NEW,b,10,2026-03-03T09:00:00\n", FILE_HEADER);
        assert!(decode(&text).is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_history_id() {
        let text = format!(
            "{}\n1,TASK,a,NEW,b,10,2026-03-03T09:00:00\n\n7\n",
            FILE_HEADER
        );
        assert!(decode(&text).is_err());
    }

    #[test]
    fn test_decode_skips_subtask_with_missing_epic() {
        // Trusted file with a dangling parent: the subtask loads but stays
        // unlinked, matching the defensive relink pass
        let text = format!(
            "{}\n5,SUBTASK,s,NEW,d,9,15,2026-03-03T09:00:00\n\n\n",
            FILE_HEADER
        );
        let engine = decode(&text).unwrap();
        assert_eq!(engine.list_subtasks().len(), 1);
        assert!(engine.list_epics().is_empty());
    }

    #[test]
    fn test_history_order_survives_roundtrip() {
        let mut engine = TaskEngine::new();
        let a = engine
            .create_task(Task::scheduled("a", "d", Duration::minutes(5), dt(9, 0)))
            .unwrap();
        let b = engine
            .create_task(Task::scheduled("b", "d", Duration::minutes(5), dt(10, 0)))
            .unwrap();
        engine.get_task(a).unwrap();
        engine.get_task(b).unwrap();
        engine.get_task(a).unwrap();

        let restored = decode(&encode(&engine)).unwrap();
        let ids: Vec<EntityId> = restored.get_history().iter().map(Entity::id).collect();
        assert_eq!(ids, vec![b, a]);
    }
}
