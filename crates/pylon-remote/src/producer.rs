use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use pylon_core::{BackupId, ServerId};

use crate::error::Result;

/// Size and integrity data reported by the node daemon once a backup has
/// finished (successfully or not). Checksums are opaque to the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub size_bytes: u64,
    pub checksum: Option<String>,
}

/// The collaborator that produces and stores backup bytes.
///
/// `request` only kicks production off — completion arrives later through
/// the daemon's completion callback, which the API layer routes to
/// `BackupLifecycleManager::complete`. The engine never sees backup content.
#[async_trait]
pub trait BackupProducer: Send + Sync {
    /// Start producing a backup of `server` under the given record id.
    async fn request(
        &self,
        server: &ServerId,
        backup: &BackupId,
        ignored_patterns: &str,
    ) -> Result<()>;

    /// Reclaim the storage behind a deleted (or rotated) backup.
    async fn reclaim(&self, server: &ServerId, backup: &BackupId) -> Result<()>;
}
