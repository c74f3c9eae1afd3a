pub mod backups;
pub mod error;
pub mod health;
pub mod schedules;

pub use error::ApiError;
