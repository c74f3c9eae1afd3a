use thiserror::Error;

/// Errors that can occur within the backup subsystem.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Backup not found: {id}")]
    NotFound { id: String },

    /// The server is at its backup limit and every existing backup is
    /// locked or still pending — nothing can be rotated out.
    #[error("Backup limit of {limit} reached for server {server_id} and no backup is eligible for rotation")]
    Capacity { server_id: String, limit: u32 },

    /// Deletion of a locked backup.
    #[error("Backup {id} is locked")]
    Locked { id: String },

    /// An operation that requires a specific state, e.g. restoring a backup
    /// that is not successful.
    #[error("Backup {id} is {state}, expected {expected}")]
    WrongState {
        id: String,
        state: String,
        expected: String,
    },

    /// The producer or gateway refused the request.
    #[error("Remote error: {0}")]
    Remote(#[from] pylon_remote::RemoteError),

    /// A stored record could not be decoded (corrupt row).
    #[error("Corrupt backup record: {0}")]
    CorruptRecord(String),
}

pub type Result<T> = std::result::Result<T, BackupError>;
