use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;

use pylon_core::{RunId, ScheduleId, ServerId, TaskId};

use crate::cron::CronExpression;
use crate::db::init_db;
use crate::error::{Result, SchedulerError};
use crate::types::{Schedule, Task, TaskAction, TaskRunRecord};

/// Fields the CRUD layer supplies when creating a schedule.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub server_id: ServerId,
    pub name: String,
    pub cron: CronExpression,
    pub is_active: bool,
    pub only_when_online: bool,
}

/// Fields the CRUD layer supplies when creating a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub schedule_id: ScheduleId,
    pub sort_order: i64,
    pub action: TaskAction,
    pub time_offset_secs: u32,
    pub continue_on_failure: bool,
}

/// Thread-safe store for schedules, their task chains, and run history.
///
/// Wraps a single SQLite connection in a `Mutex`; every subsystem in the
/// daemon opens its own connection against the shared WAL database.
pub struct ScheduleStore {
    db: Mutex<Connection>,
}

impl ScheduleStore {
    /// Wrap a connection, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    // --- CRUD (exposed to the panel layer) ---------------------------------

    /// Create a schedule. `next_run_at` is computed immediately so the
    /// engine can pick it up on the next tick; an unsatisfiable cron is a
    /// creation-time error, surfaced here rather than at run time.
    pub fn create_schedule(&self, new: NewSchedule) -> Result<Schedule> {
        if new.name.trim().is_empty() {
            return Err(SchedulerError::Validation(
                "schedule name must not be empty".to_string(),
            ));
        }
        let now = Utc::now();
        let next_run_at = new.cron.next_after(now)?;
        let id = ScheduleId::new();

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO schedules
             (id, server_id, name, cron, is_active, only_when_online,
              last_run_at, next_run_at, last_run_ok, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, NULL, ?8, ?8)",
            rusqlite::params![
                id.as_str(),
                new.server_id.as_str(),
                new.name,
                new.cron.expression(),
                new.is_active,
                new.only_when_online,
                next_run_at.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;
        debug!(schedule_id = %id, name = %new.name, "schedule created");

        Ok(Schedule {
            id,
            server_id: new.server_id,
            name: new.name,
            cron: new.cron,
            is_active: new.is_active,
            only_when_online: new.only_when_online,
            last_run_at: None,
            next_run_at: Some(next_run_at),
            last_run_ok: None,
            created_at: now,
            updated_at: now,
            tasks: Vec::new(),
        })
    }

    /// Update a schedule's editable fields and recompute `next_run_at` —
    /// the invariant is that it always reflects the current cron fields.
    pub fn update_schedule(
        &self,
        id: &ScheduleId,
        name: String,
        cron: CronExpression,
        is_active: bool,
        only_when_online: bool,
    ) -> Result<Schedule> {
        if name.trim().is_empty() {
            return Err(SchedulerError::Validation(
                "schedule name must not be empty".to_string(),
            ));
        }
        let now = Utc::now();
        let next_run_at = cron.next_after(now)?;

        {
            let db = self.db.lock().unwrap();
            let rows_changed = db.execute(
                "UPDATE schedules
                 SET name = ?1, cron = ?2, is_active = ?3, only_when_online = ?4,
                     next_run_at = ?5, updated_at = ?6
                 WHERE id = ?7",
                rusqlite::params![
                    name,
                    cron.expression(),
                    is_active,
                    only_when_online,
                    next_run_at.to_rfc3339(),
                    now.to_rfc3339(),
                    id.as_str(),
                ],
            )?;
            if rows_changed == 0 {
                return Err(SchedulerError::ScheduleNotFound {
                    id: id.to_string(),
                });
            }
        }

        self.get_schedule(id)?
            .ok_or_else(|| SchedulerError::ScheduleNotFound {
                id: id.to_string(),
            })
    }

    /// Delete a schedule and (via cascade) its tasks and run history.
    /// The daemon refuses this while the schedule's run guard is held.
    pub fn delete_schedule(&self, id: &ScheduleId) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "DELETE FROM schedules WHERE id = ?1",
            rusqlite::params![id.as_str()],
        )?;
        if rows_changed == 0 {
            return Err(SchedulerError::ScheduleNotFound {
                id: id.to_string(),
            });
        }
        debug!(schedule_id = %id, "schedule deleted");
        Ok(())
    }

    /// Retrieve one schedule with its task chain, `None` if unknown.
    pub fn get_schedule(&self, id: &ScheduleId) -> Result<Option<Schedule>> {
        let db = self.db.lock().unwrap();
        let schedule = match db.query_row(
            &format!("{SCHEDULE_SELECT} WHERE id = ?1"),
            rusqlite::params![id.as_str()],
            row_to_schedule,
        ) {
            Ok(decoded) => decoded?,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let tasks = load_tasks(&db, id)?;
        Ok(Some(Schedule { tasks, ..schedule }))
    }

    /// All schedules for one server, tasks included, oldest first.
    pub fn list_schedules(&self, server_id: &ServerId) -> Result<Vec<Schedule>> {
        let db = self.db.lock().unwrap();
        let mut stmt =
            db.prepare(&format!("{SCHEDULE_SELECT} WHERE server_id = ?1 ORDER BY created_at"))?;
        let rows: Vec<_> = stmt
            .query_map(rusqlite::params![server_id.as_str()], row_to_schedule)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut schedules = Vec::with_capacity(rows.len());
        for row in rows {
            let schedule = row?;
            let tasks = load_tasks(&db, &schedule.id)?;
            schedules.push(Schedule { tasks, ..schedule });
        }
        Ok(schedules)
    }

    // --- Task CRUD ---------------------------------------------------------

    /// Create a task. Payload and offset are validated here; the sort order
    /// must be unique within the schedule.
    pub fn create_task(&self, new: NewTask) -> Result<Task> {
        let now = Utc::now();
        let task = Task {
            id: TaskId::new(),
            schedule_id: new.schedule_id,
            sort_order: new.sort_order,
            action: new.action,
            time_offset_secs: new.time_offset_secs,
            continue_on_failure: new.continue_on_failure,
            created_at: now,
            updated_at: now,
        };
        task.validate()?;
        let action_json = serde_json::to_string(&task.action)
            .map_err(|e| SchedulerError::Validation(e.to_string()))?;

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO tasks
             (id, schedule_id, sort_order, action, time_offset_secs,
              continue_on_failure, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            rusqlite::params![
                task.id.as_str(),
                task.schedule_id.as_str(),
                task.sort_order,
                action_json,
                task.time_offset_secs,
                task.continue_on_failure,
                now.to_rfc3339(),
            ],
        )
        .map_err(map_task_insert_err)?;
        debug!(task_id = %task.id, schedule_id = %task.schedule_id, "task created");
        Ok(task)
    }

    /// Update a task's action, offset, order and failure policy.
    pub fn update_task(
        &self,
        id: &TaskId,
        sort_order: i64,
        action: TaskAction,
        time_offset_secs: u32,
        continue_on_failure: bool,
    ) -> Result<()> {
        action.validate()?;
        if time_offset_secs > pylon_core::config::MAX_TASK_OFFSET_SECS {
            return Err(SchedulerError::Validation(format!(
                "time offset {}s exceeds maximum of {}s",
                time_offset_secs,
                pylon_core::config::MAX_TASK_OFFSET_SECS
            )));
        }
        let action_json = serde_json::to_string(&action)
            .map_err(|e| SchedulerError::Validation(e.to_string()))?;

        let db = self.db.lock().unwrap();
        let rows_changed = db
            .execute(
                "UPDATE tasks
                 SET sort_order = ?1, action = ?2, time_offset_secs = ?3,
                     continue_on_failure = ?4, updated_at = ?5
                 WHERE id = ?6",
                rusqlite::params![
                    sort_order,
                    action_json,
                    time_offset_secs,
                    continue_on_failure,
                    Utc::now().to_rfc3339(),
                    id.as_str(),
                ],
            )
            .map_err(map_task_insert_err)?;
        if rows_changed == 0 {
            return Err(SchedulerError::TaskNotFound { id: id.to_string() });
        }
        Ok(())
    }

    pub fn delete_task(&self, id: &TaskId) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "DELETE FROM tasks WHERE id = ?1",
            rusqlite::params![id.as_str()],
        )?;
        if rows_changed == 0 {
            return Err(SchedulerError::TaskNotFound { id: id.to_string() });
        }
        Ok(())
    }

    // --- Engine-facing operations ------------------------------------------

    /// Schedules whose `next_run_at` has arrived. The `only_when_online`
    /// gate is applied by the engine, which can reach the gateway.
    pub fn due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare_cached(&format!(
            "{SCHEDULE_SELECT}
             WHERE is_active = 1 AND next_run_at IS NOT NULL AND next_run_at <= ?1"
        ))?;
        let rows: Vec<_> = stmt
            .query_map(rusqlite::params![now.to_rfc3339()], row_to_schedule)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut due = Vec::with_capacity(rows.len());
        for row in rows {
            let schedule = row?;
            let tasks = load_tasks(&db, &schedule.id)?;
            due.push(Schedule { tasks, ..schedule });
        }
        Ok(due)
    }

    /// Stamp the start of a run. Idempotent: re-stamping the same instant
    /// writes the same value.
    pub fn record_run_start(&self, id: &ScheduleId, now: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "UPDATE schedules SET last_run_at = ?1, updated_at = ?1 WHERE id = ?2",
            rusqlite::params![now.to_rfc3339(), id.as_str()],
        )?;
        if rows_changed == 0 {
            return Err(SchedulerError::ScheduleNotFound {
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Persist a run's outcome and the freshly computed `next_run_at`
    /// (`None` when the cron has become unsatisfiable — the schedule simply
    /// stops being due). Idempotent under retried delivery.
    pub fn record_run_result(
        &self,
        id: &ScheduleId,
        next_run_at: Option<DateTime<Utc>>,
        succeeded: bool,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "UPDATE schedules
             SET next_run_at = ?1, last_run_ok = ?2, updated_at = ?3
             WHERE id = ?4",
            rusqlite::params![
                next_run_at.map(|t| t.to_rfc3339()),
                succeeded,
                Utc::now().to_rfc3339(),
                id.as_str(),
            ],
        )?;
        if rows_changed == 0 {
            return Err(SchedulerError::ScheduleNotFound {
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Record one task's result within a run. Keyed on `(run_id, task_id)`
    /// so an at-least-once retry of the same result is a no-op overwrite.
    pub fn append_task_result(
        &self,
        run_id: &RunId,
        task_id: &TaskId,
        succeeded: bool,
        error_detail: Option<&str>,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR REPLACE INTO task_runs
             (run_id, task_id, succeeded, error_detail, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                run_id.as_str(),
                task_id.as_str(),
                succeeded,
                error_detail,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Run history for one schedule, newest first.
    pub fn list_task_results(&self, schedule_id: &ScheduleId) -> Result<Vec<TaskRunRecord>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT tr.run_id, tr.task_id, tr.succeeded, tr.error_detail, tr.recorded_at
             FROM task_runs tr
             JOIN tasks t ON t.id = tr.task_id
             WHERE t.schedule_id = ?1
             ORDER BY tr.recorded_at DESC",
        )?;
        let rows = stmt.query_map(rusqlite::params![schedule_id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (run_id, task_id, succeeded, error_detail, recorded_at) = row?;
            records.push(TaskRunRecord {
                run_id: RunId(run_id),
                task_id: TaskId(task_id),
                succeeded,
                error_detail,
                recorded_at: parse_timestamp(&recorded_at)?,
            });
        }
        Ok(records)
    }
}

const SCHEDULE_SELECT: &str = "SELECT id, server_id, name, cron, is_active, only_when_online,
        last_run_at, next_run_at, last_run_ok, created_at, updated_at
 FROM schedules";

/// Map a `schedules` row. Returns a nested Result: the outer layer is
/// rusqlite's row access, the inner layer is record decoding (cron text,
/// timestamps) which surfaces as `CorruptRecord`.
fn row_to_schedule(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Schedule>> {
    let id: String = row.get(0)?;
    let server_id: String = row.get(1)?;
    let name: String = row.get(2)?;
    let cron_text: String = row.get(3)?;
    let is_active: bool = row.get(4)?;
    let only_when_online: bool = row.get(5)?;
    let last_run_at: Option<String> = row.get(6)?;
    let next_run_at: Option<String> = row.get(7)?;
    let last_run_ok: Option<bool> = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    let decode = || -> Result<Schedule> {
        Ok(Schedule {
            id: ScheduleId(id),
            server_id: ServerId(server_id),
            name,
            cron: CronExpression::parse(&cron_text)
                .map_err(|e| SchedulerError::CorruptRecord(e.to_string()))?,
            is_active,
            only_when_online,
            last_run_at: last_run_at.as_deref().map(parse_timestamp).transpose()?,
            next_run_at: next_run_at.as_deref().map(parse_timestamp).transpose()?,
            last_run_ok,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
            tasks: Vec::new(),
        })
    };
    Ok(decode())
}

fn load_tasks(db: &Connection, schedule_id: &ScheduleId) -> Result<Vec<Task>> {
    let mut stmt = db.prepare_cached(
        "SELECT id, schedule_id, sort_order, action, time_offset_secs,
                continue_on_failure, created_at, updated_at
         FROM tasks WHERE schedule_id = ?1 ORDER BY sort_order",
    )?;
    let rows = stmt.query_map(rusqlite::params![schedule_id.as_str()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, u32>(4)?,
            row.get::<_, bool>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    let mut tasks = Vec::new();
    for row in rows {
        let (id, schedule_id, sort_order, action_json, offset, cont, created_at, updated_at) =
            row?;
        tasks.push(Task {
            id: TaskId(id),
            schedule_id: ScheduleId(schedule_id),
            sort_order,
            action: serde_json::from_str(&action_json)
                .map_err(|e| SchedulerError::CorruptRecord(e.to_string()))?,
            time_offset_secs: offset,
            continue_on_failure: cont,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        });
    }
    Ok(tasks)
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SchedulerError::CorruptRecord(format!("bad timestamp '{text}': {e}")))
}

/// A UNIQUE(schedule_id, sort_order) violation is an input problem, not a
/// database fault.
fn map_task_insert_err(e: rusqlite::Error) -> SchedulerError {
    if let rusqlite::Error::SqliteFailure(err, _) = &e {
        if err.code == rusqlite::ErrorCode::ConstraintViolation {
            return SchedulerError::Validation(
                "task sort order already in use for this schedule".to_string(),
            );
        }
    }
    e.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store() -> ScheduleStore {
        ScheduleStore::new(Connection::open_in_memory().expect("open in-memory db"))
            .expect("init schema")
    }

    fn new_schedule(server: &str) -> NewSchedule {
        NewSchedule {
            server_id: ServerId::from(server),
            name: "nightly restart".to_string(),
            cron: CronExpression::parse("0 4 * * *").unwrap(),
            is_active: true,
            only_when_online: false,
        }
    }

    fn command_task(schedule_id: &ScheduleId, order: i64) -> NewTask {
        NewTask {
            schedule_id: schedule_id.clone(),
            sort_order: order,
            action: TaskAction::Command {
                payload: "say restarting soon".to_string(),
            },
            time_offset_secs: 0,
            continue_on_failure: false,
        }
    }

    #[test]
    fn create_sets_next_run_at() {
        let store = store();
        let schedule = store.create_schedule(new_schedule("srv-1")).unwrap();
        let next = schedule.next_run_at.expect("next_run_at set on create");
        assert!(next > Utc::now());
        assert!(schedule.cron.matches(next));
    }

    #[test]
    fn get_returns_tasks_in_order() {
        let store = store();
        let schedule = store.create_schedule(new_schedule("srv-1")).unwrap();
        store.create_task(command_task(&schedule.id, 3)).unwrap();
        store.create_task(command_task(&schedule.id, 1)).unwrap();
        store.create_task(command_task(&schedule.id, 2)).unwrap();

        let loaded = store.get_schedule(&schedule.id).unwrap().unwrap();
        let orders: Vec<i64> = loaded.tasks.iter().map(|t| t.sort_order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_sort_order_is_a_validation_error() {
        let store = store();
        let schedule = store.create_schedule(new_schedule("srv-1")).unwrap();
        store.create_task(command_task(&schedule.id, 1)).unwrap();
        match store.create_task(command_task(&schedule.id, 1)) {
            Err(SchedulerError::Validation(_)) => {}
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn due_query_honors_activity_and_time() {
        let store = store();
        let schedule = store.create_schedule(new_schedule("srv-1")).unwrap();
        // Not due yet: next_run_at is in the future.
        assert!(store.due_schedules(Utc::now()).unwrap().is_empty());

        // Force next_run_at into the past.
        let past = Utc::now() - Duration::minutes(5);
        store
            .record_run_result(&schedule.id, Some(past), true)
            .unwrap();
        let due = store.due_schedules(Utc::now()).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, schedule.id);

        // Deactivate: no longer due.
        store
            .update_schedule(
                &schedule.id,
                schedule.name.clone(),
                schedule.cron.clone(),
                false,
                false,
            )
            .unwrap();
        // update recomputes next_run_at into the future, so re-force it.
        store
            .record_run_result(&schedule.id, Some(past), true)
            .unwrap();
        assert!(store.due_schedules(Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn update_recomputes_next_run_at() {
        let store = store();
        let schedule = store.create_schedule(new_schedule("srv-1")).unwrap();
        let hourly = CronExpression::parse("0 * * * *").unwrap();
        let updated = store
            .update_schedule(&schedule.id, "hourly".to_string(), hourly.clone(), true, true)
            .unwrap();
        let next = updated.next_run_at.unwrap();
        assert!(hourly.matches(next));
        assert!(updated.only_when_online);
    }

    #[test]
    fn task_results_are_idempotent_per_run() {
        let store = store();
        let schedule = store.create_schedule(new_schedule("srv-1")).unwrap();
        let task = store.create_task(command_task(&schedule.id, 1)).unwrap();

        let run = RunId::new();
        store
            .append_task_result(&run, &task.id, false, Some("gateway refused"))
            .unwrap();
        // Retried delivery of the same result.
        store
            .append_task_result(&run, &task.id, false, Some("gateway refused"))
            .unwrap();

        let results = store.list_task_results(&schedule.id).unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].succeeded);
        assert_eq!(results[0].error_detail.as_deref(), Some("gateway refused"));
    }

    #[test]
    fn delete_cascades_to_tasks() {
        let store = store();
        let schedule = store.create_schedule(new_schedule("srv-1")).unwrap();
        store.create_task(command_task(&schedule.id, 1)).unwrap();
        store.delete_schedule(&schedule.id).unwrap();
        assert!(store.get_schedule(&schedule.id).unwrap().is_none());
        assert!(store.list_task_results(&schedule.id).unwrap().is_empty());
    }

    #[test]
    fn missing_ids_are_not_found() {
        let store = store();
        assert!(matches!(
            store.delete_schedule(&ScheduleId::from("nope")),
            Err(SchedulerError::ScheduleNotFound { .. })
        ));
        assert!(matches!(
            store.delete_task(&TaskId::from("nope")),
            Err(SchedulerError::TaskNotFound { .. })
        ));
    }
}
