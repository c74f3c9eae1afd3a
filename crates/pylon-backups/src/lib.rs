//! `pylon-backups` — the backup lifecycle state machine.
//!
//! A backup record is created `pending`, transitions exactly once to
//! `successful` or `failed` when the producer reports back, and can be
//! locked at any point. Locked backups are exempt from deletion and from
//! rotation; rotation evicts the oldest unlocked, non-pending backup when a
//! server is at its limit and a new backup is requested.

pub mod db;
pub mod error;
pub mod manager;
pub mod types;

pub use error::{BackupError, Result};
pub use manager::{BackupLifecycleManager, InitiateRequest};
pub use types::{Backup, BackupState};
