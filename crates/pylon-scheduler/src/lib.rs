//! `pylon-scheduler` — cron evaluation and task-chain execution for managed
//! game servers.
//!
//! # Overview
//!
//! Schedules are persisted to a SQLite `schedules` table, each carrying an
//! ordered chain of tasks. The [`engine::Scheduler`] ticks on a fixed
//! cadence, asks the [`store::ScheduleStore`] which schedules are due, and
//! dispatches each to the [`executor::TaskChainExecutor`] under a
//! per-schedule exclusivity guard — a due schedule whose previous run is
//! still in flight is skipped, never queued.
//!
//! Within a run, tasks execute strictly in order: console command, power
//! signal or backup creation, each optionally delayed relative to the
//! previous task's completion and scoped by its own continue-on-failure
//! policy.

pub mod cron;
pub mod db;
pub mod engine;
pub mod error;
pub mod executor;
pub mod store;
pub mod types;

pub use cron::CronExpression;
pub use engine::Scheduler;
pub use error::{Result, SchedulerError};
pub use executor::TaskChainExecutor;
pub use store::ScheduleStore;
pub use types::{RunOutcome, Schedule, Task, TaskAction};
