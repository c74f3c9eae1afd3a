use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pylon_core::{BackupId, ServerId};

/// Lifecycle state of a backup record.
///
/// `Pending` is the only non-terminal state; the completion signal from the
/// producer moves a backup to exactly one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupState {
    /// Created, production requested, bytes not yet confirmed.
    Pending,
    /// Produced and stored; restorable.
    Successful,
    /// Production failed; kept for operator inspection until deleted.
    Failed,
}

impl BackupState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BackupState::Pending)
    }
}

impl std::fmt::Display for BackupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BackupState::Pending => "pending",
            BackupState::Successful => "successful",
            BackupState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for BackupState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BackupState::Pending),
            "successful" => Ok(BackupState::Successful),
            "failed" => Ok(BackupState::Failed),
            other => Err(format!("unknown backup state: {other}")),
        }
    }
}

/// A persisted backup record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backup {
    pub id: BackupId,
    pub server_id: ServerId,
    pub name: String,
    /// Newline-separated glob patterns excluded from the archive.
    pub ignored_patterns: String,
    /// A locked backup is never deleted or rotated, whatever its age.
    pub is_locked: bool,
    pub state: BackupState,
    /// Set once the backup completes successfully.
    pub size_bytes: Option<u64>,
    pub checksum: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Backup {
    /// Whether rotation may evict this backup: unlocked and not mid-flight.
    pub fn rotation_eligible(&self) -> bool {
        !self.is_locked && self.state != BackupState::Pending
    }
}
