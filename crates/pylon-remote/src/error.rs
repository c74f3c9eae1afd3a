use thiserror::Error;

/// Errors surfaced by the node-daemon collaborators.
///
/// The scheduler treats every variant the same way — an action failure that
/// is recorded against the task and scoped by its continue-on-failure
/// policy. The distinctions exist for logging and for the API layer.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Node daemon unreachable: {0}")]
    Unreachable(String),

    /// The node daemon accepted the connection but refused the action,
    /// e.g. a power signal while the server is restoring a backup.
    #[error("Action refused by node daemon (status {status}): {message}")]
    Refused { status: u16, message: String },

    #[error("Unexpected node daemon response: {0}")]
    BadResponse(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        RemoteError::Unreachable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;
