//! Schedule and task endpoints under `/servers/{server}/schedules`.
//!
//! The daemon owns schedule semantics only; who may call these routes is the
//! panel layer's problem. Paths carry the server id so a schedule can never
//! be addressed through the wrong server.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use pylon_core::{ScheduleId, ServerId, TaskId};
use pylon_scheduler::store::{NewSchedule, NewTask};
use pylon_scheduler::types::TaskRunRecord;
use pylon_scheduler::{CronExpression, Schedule, SchedulerError, Task, TaskAction};

use crate::app::AppState;
use crate::http::ApiError;

#[derive(Deserialize)]
pub struct CreateScheduleBody {
    pub name: String,
    /// Five-field cron expression, `minute hour dom month dow`.
    pub cron: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub only_when_online: bool,
}

fn default_true() -> bool {
    true
}

/// PATCH body; absent fields keep their current value.
#[derive(Deserialize)]
pub struct UpdateScheduleBody {
    pub name: Option<String>,
    pub cron: Option<String>,
    pub is_active: Option<bool>,
    pub only_when_online: Option<bool>,
}

#[derive(Deserialize)]
pub struct TaskBody {
    pub sort_order: i64,
    pub action: TaskAction,
    #[serde(default)]
    pub time_offset_secs: u32,
    #[serde(default)]
    pub continue_on_failure: bool,
}

/// GET /servers/{server}/schedules
pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(server): Path<String>,
) -> Result<Json<Vec<Schedule>>, ApiError> {
    let schedules = state.store.list_schedules(&ServerId::from(server))?;
    Ok(Json(schedules))
}

/// POST /servers/{server}/schedules
pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(server): Path<String>,
    Json(body): Json<CreateScheduleBody>,
) -> Result<(StatusCode, Json<Schedule>), ApiError> {
    let cron = CronExpression::parse(&body.cron)?;
    let schedule = state.store.create_schedule(NewSchedule {
        server_id: ServerId::from(server),
        name: body.name,
        cron,
        is_active: body.is_active,
        only_when_online: body.only_when_online,
    })?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

/// GET /servers/{server}/schedules/{schedule}
pub async fn show(
    State(state): State<Arc<AppState>>,
    Path((server, schedule)): Path<(String, String)>,
) -> Result<Json<Schedule>, ApiError> {
    let schedule = fetch(&state, &server, &schedule)?;
    Ok(Json(schedule))
}

/// PATCH /servers/{server}/schedules/{schedule}
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path((server, schedule)): Path<(String, String)>,
    Json(body): Json<UpdateScheduleBody>,
) -> Result<Json<Schedule>, ApiError> {
    let current = fetch(&state, &server, &schedule)?;
    let cron = match body.cron {
        Some(text) => CronExpression::parse(&text)?,
        None => current.cron.clone(),
    };
    let updated = state.store.update_schedule(
        &current.id,
        body.name.unwrap_or(current.name),
        cron,
        body.is_active.unwrap_or(current.is_active),
        body.only_when_online.unwrap_or(current.only_when_online),
    )?;
    Ok(Json(updated))
}

/// DELETE /servers/{server}/schedules/{schedule}
///
/// Refused while a run is in flight — the executor still holds references
/// into the schedule's chain.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path((server, schedule)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let current = fetch(&state, &server, &schedule)?;
    if state.executor.is_running(&current.id) {
        return Err(SchedulerError::RunInProgress {
            id: current.id.to_string(),
        }
        .into());
    }
    state.store.delete_schedule(&current.id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /servers/{server}/schedules/{schedule}/results
pub async fn results(
    State(state): State<Arc<AppState>>,
    Path((server, schedule)): Path<(String, String)>,
) -> Result<Json<Vec<TaskRunRecord>>, ApiError> {
    let current = fetch(&state, &server, &schedule)?;
    let records = state.store.list_task_results(&current.id)?;
    Ok(Json(records))
}

/// POST /servers/{server}/schedules/{schedule}/tasks
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Path((server, schedule)): Path<(String, String)>,
    Json(body): Json<TaskBody>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let current = fetch(&state, &server, &schedule)?;
    let task = state.store.create_task(NewTask {
        schedule_id: current.id,
        sort_order: body.sort_order,
        action: body.action,
        time_offset_secs: body.time_offset_secs,
        continue_on_failure: body.continue_on_failure,
    })?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// PATCH /servers/{server}/schedules/{schedule}/tasks/{task}
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Path((server, schedule, task)): Path<(String, String, String)>,
    Json(body): Json<TaskBody>,
) -> Result<StatusCode, ApiError> {
    fetch(&state, &server, &schedule)?;
    state.store.update_task(
        &TaskId::from(task),
        body.sort_order,
        body.action,
        body.time_offset_secs,
        body.continue_on_failure,
    )?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /servers/{server}/schedules/{schedule}/tasks/{task}
pub async fn remove_task(
    State(state): State<Arc<AppState>>,
    Path((server, schedule, task)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    fetch(&state, &server, &schedule)?;
    state.store.delete_task(&TaskId::from(task))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Load a schedule and verify it belongs to the server in the path.
fn fetch(state: &AppState, server: &str, schedule: &str) -> Result<Schedule, ApiError> {
    let id = ScheduleId::from(schedule);
    let found = state
        .store
        .get_schedule(&id)?
        .filter(|s| s.server_id.as_str() == server);
    found.ok_or_else(|| {
        SchedulerError::ScheduleNotFound {
            id: id.to_string(),
        }
        .into()
    })
}
