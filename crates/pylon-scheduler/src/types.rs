use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pylon_core::config::MAX_TASK_OFFSET_SECS;
use pylon_core::{RunId, ScheduleId, ServerId, TaskId};
use pylon_remote::PowerAction;

use crate::cron::CronExpression;
use crate::error::{Result, SchedulerError};

/// What a task does when its turn in the chain comes up.
///
/// One variant per action kind, each with its own typed payload — the
/// payload is validated when the task is created, never at run time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskAction {
    /// Send free-form console input to the server.
    Command { payload: String },

    /// Request a power transition.
    Power { action: PowerAction },

    /// Create a backup; `ignored_patterns` is forwarded to the producer.
    Backup { ignored_patterns: String },
}

impl TaskAction {
    /// Payload validation happens when the task is created; a task that
    /// made it into the store is dispatchable as-is.
    pub fn validate(&self) -> Result<()> {
        match self {
            TaskAction::Command { payload } => {
                if payload.trim().is_empty() {
                    return Err(SchedulerError::Validation(
                        "command payload must not be empty".to_string(),
                    ));
                }
            }
            // PowerAction is already a closed enum; nothing further to check.
            TaskAction::Power { .. } => {}
            // Any pattern text (including empty) is a valid ignore list.
            TaskAction::Backup { .. } => {}
        }
        Ok(())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TaskAction::Command { .. } => "command",
            TaskAction::Power { .. } => "power",
            TaskAction::Backup { .. } => "backup",
        }
    }
}

/// One step in a schedule's chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub schedule_id: ScheduleId,
    /// Execution position, unique within the schedule, ascending.
    pub sort_order: i64,
    pub action: TaskAction,
    /// Delay before this task runs, relative to the previous task's
    /// completion. Ignored for the first task in the chain.
    pub time_offset_secs: u32,
    /// When false, a failure of this task stops the rest of the chain.
    pub continue_on_failure: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn validate(&self) -> Result<()> {
        if self.time_offset_secs > MAX_TASK_OFFSET_SECS {
            return Err(SchedulerError::Validation(format!(
                "time offset {}s exceeds maximum of {}s",
                self.time_offset_secs, MAX_TASK_OFFSET_SECS
            )));
        }
        self.action.validate()
    }
}

/// A cron-triggered, ordered chain of tasks bound to one server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub server_id: ServerId,
    pub name: String,
    pub cron: CronExpression,
    pub is_active: bool,
    /// When set, the schedule only fires while the server process is online.
    pub only_when_online: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    /// Whether the most recent completed run succeeded. `None` before the
    /// first run.
    pub last_run_ok: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Chain in execution order (ascending `sort_order`).
    pub tasks: Vec<Task>,
}

/// Result of one schedule run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: RunId,
    /// True iff every executed task succeeded and the chain was not skipped.
    pub succeeded: bool,
    /// Sort order of the first failing task, if any failed.
    pub failed_at_order: Option<i64>,
    /// The guard was held by a previous run; nothing was executed.
    pub skipped: bool,
}

impl RunOutcome {
    pub fn skipped(run_id: RunId) -> Self {
        Self {
            run_id,
            succeeded: false,
            failed_at_order: None,
            skipped: true,
        }
    }
}

/// A recorded per-task result, queryable after the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRunRecord {
    pub run_id: RunId,
    pub task_id: TaskId,
    pub succeeded: bool,
    pub error_detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
