use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{info, instrument, warn};

use pylon_backups::{BackupLifecycleManager, InitiateRequest};
use pylon_core::{RunId, ScheduleId};
use pylon_remote::ServerGateway;

use crate::error::{Result, SchedulerError};
use crate::store::ScheduleStore;
use crate::types::{RunOutcome, Schedule, Task, TaskAction};

/// Runs one schedule's task chain, strictly in order, at most one run per
/// schedule at a time.
///
/// The per-schedule guard is a map entry held for the duration of a run and
/// released on drop, so a panicking task cannot wedge its schedule. A run
/// that finds the guard already held reports itself as skipped and touches
/// nothing.
pub struct TaskChainExecutor {
    store: Arc<ScheduleStore>,
    gateway: Arc<dyn ServerGateway>,
    backups: Arc<BackupLifecycleManager>,
    guards: Arc<DashMap<String, ()>>,
}

impl TaskChainExecutor {
    pub fn new(
        store: Arc<ScheduleStore>,
        gateway: Arc<dyn ServerGateway>,
        backups: Arc<BackupLifecycleManager>,
    ) -> Self {
        Self {
            store,
            gateway,
            backups,
            guards: Arc::new(DashMap::new()),
        }
    }

    /// Whether a run for this schedule is currently in flight. The API
    /// layer consults this before allowing a schedule deletion.
    pub fn is_running(&self, id: &ScheduleId) -> bool {
        self.guards.contains_key(id.as_str())
    }

    /// Execute one run of `schedule_id`'s chain.
    ///
    /// The schedule is re-fetched after the guard is acquired so the run
    /// sees edits made between enqueue and start; a schedule deactivated in
    /// that window is skipped. Offsets apply between consecutive tasks — the
    /// first task starts immediately.
    #[instrument(skip(self), fields(schedule_id = %schedule_id))]
    pub async fn execute(&self, schedule_id: &ScheduleId) -> Result<RunOutcome> {
        let run_id = RunId::new();

        let Some(_guard) = self.try_acquire(schedule_id) else {
            info!(run_id = %run_id, "previous run still in flight, skipping");
            return Ok(RunOutcome::skipped(run_id));
        };

        // A schedule deleted or deactivated between the due query and this
        // point is a non-event, not a failure.
        let Some(schedule) = self.store.get_schedule(schedule_id)? else {
            info!(run_id = %run_id, "schedule deleted before run start, skipping");
            return Ok(RunOutcome::skipped(run_id));
        };
        if !schedule.is_active {
            info!(run_id = %run_id, "schedule deactivated before run start, skipping");
            return Ok(RunOutcome::skipped(run_id));
        }

        self.store.record_run_start(schedule_id, Utc::now())?;
        info!(run_id = %run_id, tasks = schedule.tasks.len(), "run started");

        let mut failed_at_order: Option<i64> = None;
        for (position, task) in schedule.tasks.iter().enumerate() {
            if position > 0 && task.time_offset_secs > 0 {
                tokio::time::sleep(Duration::from_secs(task.time_offset_secs.into())).await;
            }

            match self.dispatch(&schedule, task).await {
                Ok(()) => {
                    self.store
                        .append_task_result(&run_id, &task.id, true, None)?;
                }
                Err(detail) => {
                    warn!(
                        run_id = %run_id,
                        task_id = %task.id,
                        kind = task.action.kind(),
                        error = %detail,
                        "task failed"
                    );
                    self.store
                        .append_task_result(&run_id, &task.id, false, Some(&detail))?;
                    failed_at_order.get_or_insert(task.sort_order);
                    if !task.continue_on_failure {
                        break;
                    }
                }
            }
        }

        let succeeded = failed_at_order.is_none();
        let next_run_at = match schedule.cron.next_after(Utc::now()) {
            Ok(t) => Some(t),
            Err(SchedulerError::UnsatisfiableCron(expr)) => {
                warn!(cron = %expr, "cron no longer satisfiable, schedule will not fire again");
                None
            }
            Err(e) => return Err(e),
        };
        self.store
            .record_run_result(schedule_id, next_run_at, succeeded)?;
        info!(run_id = %run_id, succeeded, "run finished");

        Ok(RunOutcome {
            run_id,
            succeeded,
            failed_at_order,
            skipped: false,
        })
    }

    fn try_acquire(&self, id: &ScheduleId) -> Option<RunGuard> {
        match self.guards.entry(id.as_str().to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(());
                Some(RunGuard {
                    guards: Arc::clone(&self.guards),
                    key: id.as_str().to_string(),
                })
            }
        }
    }

    /// Perform one task's action. Failures come back as display text for
    /// the run history; the caller decides whether the chain continues.
    async fn dispatch(&self, schedule: &Schedule, task: &Task) -> std::result::Result<(), String> {
        match &task.action {
            TaskAction::Command { payload } => self
                .gateway
                .send_command(&schedule.server_id, payload)
                .await
                .map_err(|e| e.to_string()),
            TaskAction::Power { action } => self
                .gateway
                .set_power(&schedule.server_id, *action)
                .await
                .map_err(|e| e.to_string()),
            TaskAction::Backup { ignored_patterns } => self
                .backups
                .initiate(InitiateRequest {
                    server_id: schedule.server_id.clone(),
                    name: format!("Scheduled by {}", schedule.name),
                    ignored_patterns: ignored_patterns.clone(),
                    is_locked: false,
                    limit: None,
                })
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
        }
    }
}

/// Releases the schedule's run guard on drop.
struct RunGuard {
    guards: Arc<DashMap<String, ()>>,
    key: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.guards.remove(&self.key);
    }
}
