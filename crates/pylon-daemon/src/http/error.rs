use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use pylon_backups::BackupError;
use pylon_scheduler::SchedulerError;

/// HTTP-facing error: a status code plus a JSON `{"error": ...}` body.
///
/// Validation problems map to 422, state conflicts (locked backups, wrong
/// lifecycle state, capacity, runs in flight) to 409, unknown ids to 404.
/// Anything internal is logged and surfaced as a bare 500.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal(detail: impl std::fmt::Display) -> Self {
        error!(error = %detail, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        use StatusCode as S;
        match &e {
            SchedulerError::Validation(_)
            | SchedulerError::InvalidCronField { .. }
            | SchedulerError::InvalidCronFieldCount(_)
            | SchedulerError::UnsatisfiableCron(_) => {
                Self::new(S::UNPROCESSABLE_ENTITY, e.to_string())
            }
            SchedulerError::ScheduleNotFound { .. } | SchedulerError::TaskNotFound { .. } => {
                Self::new(S::NOT_FOUND, e.to_string())
            }
            SchedulerError::RunInProgress { .. } => Self::new(S::CONFLICT, e.to_string()),
            SchedulerError::Database(_) | SchedulerError::CorruptRecord(_) => Self::internal(e),
        }
    }
}

impl From<BackupError> for ApiError {
    fn from(e: BackupError) -> Self {
        use StatusCode as S;
        match &e {
            BackupError::NotFound { .. } => Self::new(S::NOT_FOUND, e.to_string()),
            BackupError::Capacity { .. }
            | BackupError::Locked { .. }
            | BackupError::WrongState { .. } => Self::new(S::CONFLICT, e.to_string()),
            BackupError::Remote(_) => Self::new(S::BAD_GATEWAY, e.to_string()),
            BackupError::Database(_) | BackupError::CorruptRecord(_) => Self::internal(e),
        }
    }
}
