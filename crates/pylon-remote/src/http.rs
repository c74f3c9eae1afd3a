use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use pylon_core::{BackupId, ServerId};

use crate::error::{RemoteError, Result};
use crate::gateway::{PowerAction, ServerGateway};
use crate::producer::BackupProducer;

/// Upper bound on any single node-daemon call; an unresponsive node must
/// surface as an `Unreachable` error, not a hung scheduler task.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// HTTP client for the node daemon REST API.
///
/// One instance per node; the daemon wires a single `Arc<HttpRemote>` into
/// both the scheduler and the backup manager.
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpRemote {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/servers{}", self.base_url, path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .timeout(REQUEST_TIMEOUT)
            .header("Authorization", format!("Bearer {}", self.token))
    }

    /// POST a JSON body and map non-2xx statuses to `Refused`.
    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let url = self.url(path);
        let resp = self
            .authed(self.client.post(&url).json(&body))
            .send()
            .await?;
        check_status(resp).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        let resp = self.authed(self.client.delete(&url)).send().await?;
        check_status(resp).await?;
        Ok(())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let code = status.as_u16();
    let message = resp.text().await.unwrap_or_default();
    warn!(status = code, body = %message, "node daemon refused request");
    Err(RemoteError::Refused {
        status: code,
        message,
    })
}

#[derive(Debug, Deserialize)]
struct StateResponse {
    /// One of "offline", "starting", "running", "stopping", "restoring".
    state: String,
}

#[async_trait]
impl ServerGateway for HttpRemote {
    async fn send_command(&self, server: &ServerId, command: &str) -> Result<()> {
        debug!(server = %server, "forwarding console command");
        self.post_json(
            &format!("/{server}/commands"),
            json!({ "command": command }),
        )
        .await?;
        Ok(())
    }

    async fn set_power(&self, server: &ServerId, action: PowerAction) -> Result<()> {
        debug!(server = %server, action = %action, "forwarding power signal");
        self.post_json(&format!("/{server}/power"), json!({ "action": action }))
            .await?;
        Ok(())
    }

    async fn is_online(&self, server: &ServerId) -> Result<bool> {
        let url = self.url(&format!("/{server}/state"));
        let resp = self.authed(self.client.get(&url)).send().await?;
        let resp = check_status(resp).await?;
        let state: StateResponse = resp
            .json()
            .await
            .map_err(|e| RemoteError::BadResponse(e.to_string()))?;
        Ok(state.state == "running")
    }

    async fn begin_restore(
        &self,
        server: &ServerId,
        backup: &BackupId,
        truncate: bool,
    ) -> Result<()> {
        debug!(server = %server, backup = %backup, truncate, "arming backup restore");
        self.post_json(
            &format!("/{server}/backup/{backup}/restore"),
            json!({ "truncate_directory": truncate }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl BackupProducer for HttpRemote {
    async fn request(
        &self,
        server: &ServerId,
        backup: &BackupId,
        ignored_patterns: &str,
    ) -> Result<()> {
        debug!(server = %server, backup = %backup, "requesting backup production");
        self.post_json(
            &format!("/{server}/backup"),
            json!({ "id": backup, "ignore": ignored_patterns }),
        )
        .await?;
        Ok(())
    }

    async fn reclaim(&self, server: &ServerId, backup: &BackupId) -> Result<()> {
        debug!(server = %server, backup = %backup, "reclaiming backup storage");
        self.delete(&format!("/{server}/backup/{backup}")).await
    }
}
