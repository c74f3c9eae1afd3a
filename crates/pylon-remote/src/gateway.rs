use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use pylon_core::{BackupId, ServerId};

use crate::error::Result;

/// Power transition a task (or the panel) can request for a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    Start,
    Restart,
    Stop,
    /// Terminate the server process without a graceful shutdown window.
    Kill,
}

impl PowerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerAction::Start => "start",
            PowerAction::Restart => "restart",
            PowerAction::Stop => "stop",
            PowerAction::Kill => "kill",
        }
    }
}

impl std::str::FromStr for PowerAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "start" => Ok(PowerAction::Start),
            "restart" => Ok(PowerAction::Restart),
            "stop" => Ok(PowerAction::Stop),
            "kill" => Ok(PowerAction::Kill),
            other => Err(format!("unknown power action: {other}")),
        }
    }
}

impl std::fmt::Display for PowerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions the engine can perform against a running server.
///
/// Implemented over HTTP by [`crate::HttpRemote`]; tests substitute
/// hand-rolled mocks. Every call is fire-and-confirm: the node daemon
/// either accepts the action or refuses it, longer-running effects
/// (restores) complete out of band.
#[async_trait]
pub trait ServerGateway: Send + Sync {
    /// Send a line of console input to the server process.
    async fn send_command(&self, server: &ServerId, command: &str) -> Result<()>;

    /// Request a power transition.
    async fn set_power(&self, server: &ServerId, action: PowerAction) -> Result<()>;

    /// Whether the server process is currently running.
    async fn is_online(&self, server: &ServerId) -> Result<bool>;

    /// Put the server into its restoring state and start pulling the backup
    /// back onto disk. `truncate` deletes all existing server files first.
    async fn begin_restore(&self, server: &ServerId, backup: &BackupId, truncate: bool)
        -> Result<()>;
}
