//! `pylon-remote` — contracts for the collaborators the engine calls but
//! does not own, plus the HTTP client that fulfils them.
//!
//! The engine never touches a game server process directly. Console
//! commands, power signals, backup byte production and restores all go
//! through the node daemon that actually hosts the servers; this crate
//! defines that seam ([`ServerGateway`], [`BackupProducer`]) and ships the
//! reqwest-based implementation ([`HttpRemote`]).

pub mod error;
pub mod gateway;
pub mod http;
pub mod producer;

pub use error::{RemoteError, Result};
pub use gateway::{PowerAction, ServerGateway};
pub use http::HttpRemote;
pub use producer::{BackupMetadata, BackupProducer};
