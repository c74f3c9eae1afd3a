use thiserror::Error;

/// Errors that can occur within the scheduling subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A cron expression did not have exactly five fields.
    #[error("Invalid cron expression: expected 5 fields, got {0}")]
    InvalidCronFieldCount(usize),

    /// One cron field failed to parse or was out of range.
    #[error("Invalid cron {field} field: '{value}'")]
    InvalidCronField { field: &'static str, value: String },

    /// The expression has no occurrence within the search horizon.
    #[error("Unsatisfiable cron expression: '{0}'")]
    UnsatisfiableCron(String),

    /// A schedule or task failed creation-time validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No schedule with the given ID exists in the store.
    #[error("Schedule not found: {id}")]
    ScheduleNotFound { id: String },

    /// No task with the given ID exists in the store.
    #[error("Task not found: {id}")]
    TaskNotFound { id: String },

    /// The schedule's run guard is held; deletes are refused mid-run.
    #[error("Schedule {id} has a run in progress")]
    RunInProgress { id: String },

    /// A stored record could not be decoded (corrupt row).
    #[error("Corrupt schedule record: {0}")]
    CorruptRecord(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
