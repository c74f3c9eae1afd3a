use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rusqlite::Connection;
use tracing::{info, instrument, warn};

use pylon_core::config::{BackupsConfig, RotationCounting};
use pylon_core::{BackupId, ServerId};
use pylon_remote::{BackupMetadata, BackupProducer, ServerGateway};

use crate::db::init_db;
use crate::error::{BackupError, Result};
use crate::types::{Backup, BackupState};

/// Parameters for [`BackupLifecycleManager::initiate`].
#[derive(Debug, Clone)]
pub struct InitiateRequest {
    pub server_id: ServerId,
    pub name: String,
    pub ignored_patterns: String,
    pub is_locked: bool,
    /// Per-server limit override for callers that know the server record;
    /// falls back to the configured default.
    pub limit: Option<u32>,
}

/// Owns backup state transitions, lock policy, rotation and restore
/// orchestration.
///
/// The limit check, the rotation-delete it may trigger, and the pending
/// insert run under a per-server async mutex so two concurrent `initiate`
/// calls can never both believe they are under the limit.
pub struct BackupLifecycleManager {
    db: Mutex<Connection>,
    producer: Arc<dyn BackupProducer>,
    gateway: Arc<dyn ServerGateway>,
    config: BackupsConfig,
    server_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl BackupLifecycleManager {
    /// Wrap a connection, initialising the schema if needed.
    pub fn new(
        conn: Connection,
        producer: Arc<dyn BackupProducer>,
        gateway: Arc<dyn ServerGateway>,
        config: BackupsConfig,
    ) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            producer,
            gateway,
            config,
            server_locks: DashMap::new(),
        })
    }

    /// Create a `pending` backup and request production from the node
    /// daemon, rotating out the oldest eligible backup first when the
    /// server is at its limit.
    ///
    /// At the limit with nothing eligible (all locked or still pending),
    /// fails with [`BackupError::Capacity`] and creates no record. If the
    /// producer refuses the production request the record is kept but
    /// immediately marked failed, and the refusal is returned.
    #[instrument(skip(self, req), fields(server_id = %req.server_id, name = %req.name))]
    pub async fn initiate(&self, req: InitiateRequest) -> Result<Backup> {
        let limit = req.limit.unwrap_or(self.config.limit);
        let lock = self.server_lock(&req.server_id);
        let _guard = lock.lock().await;

        let count = self.count_for_rotation(&req.server_id)?;
        if count >= limit as i64 {
            let victim = self.oldest_rotation_candidate(&req.server_id)?.ok_or_else(|| {
                BackupError::Capacity {
                    server_id: req.server_id.to_string(),
                    limit,
                }
            })?;
            info!(backup_id = %victim.id, "rotating out oldest backup");
            self.producer.reclaim(&req.server_id, &victim.id).await?;
            self.remove_row(&victim.id)?;
        }

        let now = Utc::now();
        let backup = Backup {
            id: BackupId::new(),
            server_id: req.server_id.clone(),
            name: req.name,
            ignored_patterns: req.ignored_patterns,
            is_locked: req.is_locked,
            state: BackupState::Pending,
            size_bytes: None,
            checksum: None,
            created_at: now,
            completed_at: None,
        };
        self.insert_row(&backup)?;
        info!(backup_id = %backup.id, "backup record created");

        if let Err(e) = self
            .producer
            .request(&backup.server_id, &backup.id, &backup.ignored_patterns)
            .await
        {
            warn!(backup_id = %backup.id, error = %e, "production request refused — marking failed");
            self.transition(&backup.id, false, &BackupMetadata::default())?;
            return Err(e.into());
        }

        Ok(backup)
    }

    /// Consume the producer's completion signal: `pending` → terminal.
    ///
    /// A repeated signal for an already-terminal backup is accepted as a
    /// no-op so at-least-once delivery never surfaces as an error.
    #[instrument(skip(self, metadata), fields(backup_id = %id))]
    pub fn complete(&self, id: &BackupId, succeeded: bool, metadata: &BackupMetadata) -> Result<()> {
        self.require(id)?;
        if !self.transition(id, succeeded, metadata)? {
            info!("duplicate completion signal ignored");
            return Ok(());
        }
        info!(succeeded, "backup completed");
        Ok(())
    }

    /// Flip the lock flag. Valid in every state; returns the new value.
    pub fn toggle_lock(&self, id: &BackupId) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "UPDATE backups SET is_locked = NOT is_locked WHERE id = ?1",
            rusqlite::params![id.as_str()],
        )?;
        if rows_changed == 0 {
            return Err(BackupError::NotFound { id: id.to_string() });
        }
        let locked = db.query_row(
            "SELECT is_locked FROM backups WHERE id = ?1",
            rusqlite::params![id.as_str()],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(locked)
    }

    /// Explicit deletion. Locked backups are refused with no side effects;
    /// otherwise storage is reclaimed first, then the record removed.
    ///
    /// Takes the same per-server lock as `initiate`, so a delete can never
    /// race a rotation that has already picked this backup as its victim.
    #[instrument(skip(self), fields(backup_id = %id))]
    pub async fn delete(&self, id: &BackupId) -> Result<()> {
        let found = self.require(id)?;
        let lock = self.server_lock(&found.server_id);
        let _guard = lock.lock().await;

        // Re-read under the lock; a rotation may have removed it meanwhile.
        let backup = self.require(id)?;
        if backup.is_locked {
            return Err(BackupError::Locked { id: id.to_string() });
        }
        self.producer.reclaim(&backup.server_id, id).await?;
        self.remove_row(id)?;
        info!("backup deleted");
        Ok(())
    }

    /// Arm a restore of a successful backup. The server-side transition and
    /// eventual completion are the gateway's business — this call only
    /// starts it, exactly once per invocation.
    #[instrument(skip(self), fields(backup_id = %id, truncate))]
    pub async fn restore(&self, id: &BackupId, truncate: bool) -> Result<()> {
        let backup = self.require(id)?;
        if backup.state != BackupState::Successful {
            return Err(BackupError::WrongState {
                id: id.to_string(),
                state: backup.state.to_string(),
                expected: BackupState::Successful.to_string(),
            });
        }
        self.gateway
            .begin_restore(&backup.server_id, id, truncate)
            .await?;
        info!("restore armed");
        Ok(())
    }

    pub fn get(&self, id: &BackupId) -> Result<Option<Backup>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            &format!("{BACKUP_SELECT} WHERE id = ?1"),
            rusqlite::params![id.as_str()],
            row_to_backup,
        ) {
            Ok(decoded) => decoded.map(Some),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All backups for one server, oldest first.
    pub fn list(&self, server_id: &ServerId) -> Result<Vec<Backup>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&format!(
            "{BACKUP_SELECT} WHERE server_id = ?1 ORDER BY created_at"
        ))?;
        let rows: Vec<_> = stmt
            .query_map(rusqlite::params![server_id.as_str()], row_to_backup)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().collect()
    }

    // --- private helpers ---------------------------------------------------

    fn require(&self, id: &BackupId) -> Result<Backup> {
        self.get(id)?
            .ok_or_else(|| BackupError::NotFound { id: id.to_string() })
    }

    fn server_lock(&self, server_id: &ServerId) -> Arc<tokio::sync::Mutex<()>> {
        self.server_locks
            .entry(server_id.as_str().to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// How many of the server's backups occupy a slot, per the configured
    /// counting policy.
    fn count_for_rotation(&self, server_id: &ServerId) -> Result<i64> {
        let filter = match self.config.counting {
            RotationCounting::NonFailed => "AND state != 'failed'",
            RotationCounting::All => "",
            RotationCounting::SuccessfulOnly => "AND state = 'successful'",
        };
        let db = self.db.lock().unwrap();
        let count = db.query_row(
            &format!("SELECT COUNT(*) FROM backups WHERE server_id = ?1 {filter}"),
            rusqlite::params![server_id.as_str()],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(count)
    }

    /// Oldest unlocked, non-pending backup, if any.
    fn oldest_rotation_candidate(&self, server_id: &ServerId) -> Result<Option<Backup>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            &format!(
                "{BACKUP_SELECT}
                 WHERE server_id = ?1 AND is_locked = 0 AND state != 'pending'
                 ORDER BY created_at LIMIT 1"
            ),
            rusqlite::params![server_id.as_str()],
            row_to_backup,
        ) {
            Ok(decoded) => decoded.map(Some),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn insert_row(&self, backup: &Backup) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO backups
             (id, server_id, name, ignored_patterns, is_locked, state,
              size_bytes, checksum, created_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, NULL, ?7, NULL)",
            rusqlite::params![
                backup.id.as_str(),
                backup.server_id.as_str(),
                backup.name,
                backup.ignored_patterns,
                backup.is_locked,
                backup.state.to_string(),
                backup.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn remove_row(&self, id: &BackupId) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "DELETE FROM backups WHERE id = ?1",
            rusqlite::params![id.as_str()],
        )?;
        if rows_changed == 0 {
            return Err(BackupError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Move a pending backup to its terminal state. Returns false when the
    /// backup is no longer pending; the guard lives in the UPDATE itself,
    /// so two racing completion signals can never both apply.
    fn transition(&self, id: &BackupId, succeeded: bool, metadata: &BackupMetadata) -> Result<bool> {
        let state = if succeeded {
            BackupState::Successful
        } else {
            BackupState::Failed
        };
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "UPDATE backups
             SET state = ?1, size_bytes = ?2, checksum = ?3, completed_at = ?4
             WHERE id = ?5 AND state = 'pending'",
            rusqlite::params![
                state.to_string(),
                succeeded.then_some(metadata.size_bytes as i64),
                if succeeded { metadata.checksum.as_deref() } else { None },
                Utc::now().to_rfc3339(),
                id.as_str(),
            ],
        )?;
        Ok(rows_changed > 0)
    }
}

const BACKUP_SELECT: &str = "SELECT id, server_id, name, ignored_patterns, is_locked, state,
        size_bytes, checksum, created_at, completed_at
 FROM backups";

/// Map a `backups` row; decoding problems surface as `CorruptRecord`.
fn row_to_backup(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Backup>> {
    let id: String = row.get(0)?;
    let server_id: String = row.get(1)?;
    let name: String = row.get(2)?;
    let ignored_patterns: String = row.get(3)?;
    let is_locked: bool = row.get(4)?;
    let state_text: String = row.get(5)?;
    let size_bytes: Option<i64> = row.get(6)?;
    let checksum: Option<String> = row.get(7)?;
    let created_at: String = row.get(8)?;
    let completed_at: Option<String> = row.get(9)?;

    let decode = || -> Result<Backup> {
        Ok(Backup {
            id: BackupId(id),
            server_id: ServerId(server_id),
            name,
            ignored_patterns,
            is_locked,
            state: state_text
                .parse::<BackupState>()
                .map_err(BackupError::CorruptRecord)?,
            size_bytes: size_bytes.map(|n| n as u64),
            checksum,
            created_at: parse_timestamp(&created_at)?,
            completed_at: completed_at.as_deref().map(parse_timestamp).transpose()?,
        })
    };
    Ok(decode())
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| BackupError::CorruptRecord(format!("bad timestamp '{text}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pylon_remote::{PowerAction, RemoteError};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Producer that records calls, can be told to refuse production, and
    /// can park its first reclaim until notified.
    #[derive(Default)]
    struct MockProducer {
        requests: AtomicUsize,
        reclaims: AtomicUsize,
        refuse_requests: AtomicBool,
        reclaim_gate: Option<Arc<Notify>>,
        reclaim_gate_used: AtomicBool,
    }

    #[async_trait]
    impl BackupProducer for MockProducer {
        async fn request(
            &self,
            _server: &ServerId,
            _backup: &BackupId,
            _ignored_patterns: &str,
        ) -> pylon_remote::Result<()> {
            if self.refuse_requests.load(Ordering::SeqCst) {
                return Err(RemoteError::Refused {
                    status: 409,
                    message: "busy".to_string(),
                });
            }
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn reclaim(
            &self,
            _server: &ServerId,
            _backup: &BackupId,
        ) -> pylon_remote::Result<()> {
            if let Some(gate) = &self.reclaim_gate {
                if !self.reclaim_gate_used.swap(true, Ordering::SeqCst) {
                    gate.notified().await;
                }
            }
            self.reclaims.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockGateway {
        restores: AtomicUsize,
    }

    #[async_trait]
    impl ServerGateway for MockGateway {
        async fn send_command(
            &self,
            _server: &ServerId,
            _command: &str,
        ) -> pylon_remote::Result<()> {
            Ok(())
        }

        async fn set_power(
            &self,
            _server: &ServerId,
            _action: PowerAction,
        ) -> pylon_remote::Result<()> {
            Ok(())
        }

        async fn is_online(&self, _server: &ServerId) -> pylon_remote::Result<bool> {
            Ok(true)
        }

        async fn begin_restore(
            &self,
            _server: &ServerId,
            _backup: &BackupId,
            _truncate: bool,
        ) -> pylon_remote::Result<()> {
            self.restores.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        manager: Arc<BackupLifecycleManager>,
        producer: Arc<MockProducer>,
        gateway: Arc<MockGateway>,
    }

    fn harness(limit: u32) -> Harness {
        harness_with_producer(limit, MockProducer::default())
    }

    fn harness_with_producer(limit: u32, producer: MockProducer) -> Harness {
        let producer = Arc::new(producer);
        let gateway = Arc::new(MockGateway::default());
        let config = BackupsConfig {
            limit,
            counting: RotationCounting::NonFailed,
        };
        let manager = Arc::new(
            BackupLifecycleManager::new(
                Connection::open_in_memory().expect("open in-memory db"),
                producer.clone(),
                gateway.clone(),
                config,
            )
            .expect("init schema"),
        );
        Harness {
            manager,
            producer,
            gateway,
        }
    }

    fn request(server: &str) -> InitiateRequest {
        InitiateRequest {
            server_id: ServerId::from(server),
            name: "weekly".to_string(),
            ignored_patterns: String::new(),
            is_locked: false,
            limit: None,
        }
    }

    #[tokio::test]
    async fn initiate_creates_pending_and_requests_production() {
        let h = harness(5);
        let backup = h.manager.initiate(request("srv-1")).await.unwrap();
        assert_eq!(backup.state, BackupState::Pending);
        assert_eq!(h.producer.requests.load(Ordering::SeqCst), 1);
        let stored = h.manager.get(&backup.id).unwrap().unwrap();
        assert_eq!(stored.state, BackupState::Pending);
    }

    #[tokio::test]
    async fn completion_is_idempotent() {
        let h = harness(5);
        let backup = h.manager.initiate(request("srv-1")).await.unwrap();

        let metadata = BackupMetadata {
            size_bytes: 1024,
            checksum: Some("sha1:deadbeef".to_string()),
        };
        h.manager.complete(&backup.id, true, &metadata).unwrap();
        let stored = h.manager.get(&backup.id).unwrap().unwrap();
        assert_eq!(stored.state, BackupState::Successful);
        assert_eq!(stored.size_bytes, Some(1024));
        assert!(stored.completed_at.is_some());

        // At-least-once delivery: the duplicate signal is a no-op, even if
        // it disagrees with the first.
        h.manager
            .complete(&backup.id, false, &BackupMetadata::default())
            .unwrap();
        let unchanged = h.manager.get(&backup.id).unwrap().unwrap();
        assert_eq!(unchanged.state, BackupState::Successful);
        assert_eq!(unchanged.size_bytes, Some(1024));
        assert_eq!(unchanged.checksum.as_deref(), Some("sha1:deadbeef"));
        assert_eq!(unchanged.completed_at, stored.completed_at);
    }

    #[tokio::test]
    async fn completing_unknown_backup_is_an_error() {
        let h = harness(5);
        assert!(matches!(
            h.manager
                .complete(&BackupId::from("nope"), true, &BackupMetadata::default()),
            Err(BackupError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn rotation_evicts_oldest_unlocked() {
        let h = harness(2);
        let first = h.manager.initiate(request("srv-1")).await.unwrap();
        let second = h.manager.initiate(request("srv-1")).await.unwrap();
        h.manager
            .complete(&first.id, true, &BackupMetadata::default())
            .unwrap();
        h.manager
            .complete(&second.id, true, &BackupMetadata::default())
            .unwrap();

        // At the limit; the third initiate must rotate out `first`.
        let third = h.manager.initiate(request("srv-1")).await.unwrap();
        assert!(h.manager.get(&first.id).unwrap().is_none());
        assert!(h.manager.get(&second.id).unwrap().is_some());
        assert_eq!(third.state, BackupState::Pending);
        assert_eq!(h.producer.reclaims.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_locked_at_limit_is_a_capacity_error() {
        let h = harness(1);
        let only = h.manager.initiate(request("srv-1")).await.unwrap();
        h.manager
            .complete(&only.id, true, &BackupMetadata::default())
            .unwrap();
        assert!(h.manager.toggle_lock(&only.id).unwrap());

        match h.manager.initiate(request("srv-1")).await {
            Err(BackupError::Capacity { limit, .. }) => assert_eq!(limit, 1),
            other => panic!("expected Capacity, got {other:?}"),
        }
        // No partial state: still exactly one record.
        assert_eq!(h.manager.list(&ServerId::from("srv-1")).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pending_backups_are_not_rotation_candidates() {
        let h = harness(1);
        let pending = h.manager.initiate(request("srv-1")).await.unwrap();
        // Still pending — at the limit with no eligible candidate.
        match h.manager.initiate(request("srv-1")).await {
            Err(BackupError::Capacity { .. }) => {}
            other => panic!("expected Capacity, got {other:?}"),
        }
        assert_eq!(h.manager.get(&pending.id).unwrap().unwrap().state, BackupState::Pending);
    }

    #[tokio::test]
    async fn failed_backups_free_their_slot_under_non_failed_counting() {
        let h = harness(1);
        let failed = h.manager.initiate(request("srv-1")).await.unwrap();
        h.manager
            .complete(&failed.id, false, &BackupMetadata::default())
            .unwrap();
        // Failed backup does not count; a new one fits without rotation.
        let fresh = h.manager.initiate(request("srv-1")).await.unwrap();
        assert_eq!(fresh.state, BackupState::Pending);
        assert_eq!(h.producer.reclaims.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn limits_are_per_server() {
        let h = harness(1);
        let a = h.manager.initiate(request("srv-a")).await.unwrap();
        h.manager
            .complete(&a.id, true, &BackupMetadata::default())
            .unwrap();
        // A different server's count is unaffected.
        assert!(h.manager.initiate(request("srv-b")).await.is_ok());
    }

    #[tokio::test]
    async fn delete_refuses_locked_then_succeeds_after_unlock() {
        let h = harness(5);
        let backup = h.manager.initiate(request("srv-1")).await.unwrap();
        h.manager
            .complete(&backup.id, true, &BackupMetadata::default())
            .unwrap();
        h.manager.toggle_lock(&backup.id).unwrap();

        assert!(matches!(
            h.manager.delete(&backup.id).await,
            Err(BackupError::Locked { .. })
        ));
        // Record untouched.
        assert!(h.manager.get(&backup.id).unwrap().unwrap().is_locked);

        assert!(!h.manager.toggle_lock(&backup.id).unwrap());
        h.manager.delete(&backup.id).await.unwrap();
        assert!(h.manager.get(&backup.id).unwrap().is_none());
        assert_eq!(h.producer.reclaims.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delete_waits_for_an_in_flight_rotation() {
        let gate = Arc::new(Notify::new());
        let h = harness_with_producer(
            1,
            MockProducer {
                reclaim_gate: Some(gate.clone()),
                ..MockProducer::default()
            },
        );
        let victim = h.manager.initiate(request("srv-1")).await.unwrap();
        h.manager
            .complete(&victim.id, true, &BackupMetadata::default())
            .unwrap();

        // Rotation picks `victim` and parks inside the producer's reclaim,
        // holding the server lock.
        let manager = h.manager.clone();
        let rotating = tokio::spawn(async move { manager.initiate(request("srv-1")).await });
        tokio::task::yield_now().await;

        // A concurrent delete of the same backup must queue behind the
        // rotation instead of pulling the row out from under it.
        let manager = h.manager.clone();
        let victim_id = victim.id.clone();
        let deleting = tokio::spawn(async move { manager.delete(&victim_id).await });
        tokio::task::yield_now().await;

        gate.notify_one();
        let rotated = rotating.await.unwrap().unwrap();
        assert_eq!(rotated.state, BackupState::Pending);
        // By the time the delete got the lock the row was already rotated
        // away.
        assert!(matches!(
            deleting.await.unwrap(),
            Err(BackupError::NotFound { .. })
        ));
        assert_eq!(h.manager.list(&ServerId::from("srv-1")).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn restore_requires_successful_state() {
        let h = harness(5);
        let backup = h.manager.initiate(request("srv-1")).await.unwrap();

        // Pending → rejected.
        assert!(matches!(
            h.manager.restore(&backup.id, true).await,
            Err(BackupError::WrongState { .. })
        ));

        h.manager
            .complete(&backup.id, false, &BackupMetadata::default())
            .unwrap();
        // Failed → rejected.
        assert!(matches!(
            h.manager.restore(&backup.id, false).await,
            Err(BackupError::WrongState { .. })
        ));
        assert_eq!(h.gateway.restores.load(Ordering::SeqCst), 0);

        let good = h.manager.initiate(request("srv-1")).await.unwrap();
        h.manager
            .complete(&good.id, true, &BackupMetadata::default())
            .unwrap();
        h.manager.restore(&good.id, true).await.unwrap();
        assert_eq!(h.gateway.restores.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refused_production_marks_the_record_failed() {
        let h = harness(5);
        h.producer.refuse_requests.store(true, Ordering::SeqCst);
        let err = h.manager.initiate(request("srv-1")).await;
        assert!(matches!(err, Err(BackupError::Remote(_))));

        let backups = h.manager.list(&ServerId::from("srv-1")).unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].state, BackupState::Failed);
    }
}
