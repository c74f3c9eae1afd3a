//! `pylon-core` — shared configuration, identifiers and the top-level error
//! type used by the daemon wiring.

pub mod config;
pub mod error;
pub mod types;

pub use config::PylonConfig;
pub use error::{PylonError, Result};
pub use types::{BackupId, RunId, ScheduleId, ServerId, TaskId};
