//! Backup endpoints: creation under `/servers/{server}/backups`, lifecycle
//! operations addressed by backup id, and the node daemon's completion
//! callback.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use pylon_backups::{Backup, BackupError, InitiateRequest};
use pylon_core::{BackupId, ServerId};
use pylon_remote::BackupMetadata;

use crate::app::AppState;
use crate::http::ApiError;

#[derive(Deserialize)]
pub struct CreateBackupBody {
    pub name: Option<String>,
    #[serde(default)]
    pub ignored_patterns: String,
    #[serde(default)]
    pub is_locked: bool,
    /// Server-specific limit known to the panel; overrides the configured
    /// default for this call only.
    pub limit: Option<u32>,
}

/// Completion callback payload from the node daemon.
#[derive(Deserialize)]
pub struct CompleteBody {
    pub successful: bool,
    #[serde(default)]
    pub size_bytes: u64,
    pub checksum: Option<String>,
}

#[derive(Deserialize)]
pub struct RestoreBody {
    #[serde(default)]
    pub truncate_directory: bool,
}

/// GET /servers/{server}/backups
pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(server): Path<String>,
) -> Result<Json<Vec<Backup>>, ApiError> {
    let backups = state.backups.list(&ServerId::from(server))?;
    Ok(Json(backups))
}

/// POST /servers/{server}/backups
pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(server): Path<String>,
    Json(body): Json<CreateBackupBody>,
) -> Result<(StatusCode, Json<Backup>), ApiError> {
    let name = body
        .name
        .unwrap_or_else(|| format!("Backup at {}", Utc::now().format("%Y-%m-%d %H:%M:%S")));
    let backup = state
        .backups
        .initiate(InitiateRequest {
            server_id: ServerId::from(server),
            name,
            ignored_patterns: body.ignored_patterns,
            is_locked: body.is_locked,
            limit: body.limit,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(backup)))
}

/// GET /backups/{backup}
pub async fn show(
    State(state): State<Arc<AppState>>,
    Path(backup): Path<String>,
) -> Result<Json<Backup>, ApiError> {
    let id = BackupId::from(backup);
    let found = state
        .backups
        .get(&id)?
        .ok_or(BackupError::NotFound { id: id.to_string() })?;
    Ok(Json(found))
}

/// DELETE /backups/{backup}
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(backup): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.backups.delete(&BackupId::from(backup)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /backups/{backup}/lock — toggles the flag, returns the new value.
pub async fn lock(
    State(state): State<Arc<AppState>>,
    Path(backup): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let locked = state.backups.toggle_lock(&BackupId::from(backup))?;
    Ok(Json(serde_json::json!({ "is_locked": locked })))
}

/// POST /backups/{backup}/restore
pub async fn restore(
    State(state): State<Arc<AppState>>,
    Path(backup): Path<String>,
    Json(body): Json<RestoreBody>,
) -> Result<StatusCode, ApiError> {
    state
        .backups
        .restore(&BackupId::from(backup), body.truncate_directory)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /backups/{backup}/complete — node daemon callback, at-least-once.
pub async fn complete(
    State(state): State<Arc<AppState>>,
    Path(backup): Path<String>,
    Json(body): Json<CompleteBody>,
) -> Result<StatusCode, ApiError> {
    let metadata = BackupMetadata {
        size_bytes: body.size_bytes,
        checksum: body.checksum,
    };
    state
        .backups
        .complete(&BackupId::from(backup), body.successful, &metadata)?;
    Ok(StatusCode::NO_CONTENT)
}
