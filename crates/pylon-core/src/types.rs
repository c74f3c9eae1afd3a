use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

id_type! {
    /// Identifier of a managed game-server instance. Minted by the panel
    /// layer — the engine only carries it through to the node daemon.
    ServerId
}

id_type! {
    /// Unique identifier for a schedule.
    ScheduleId
}

id_type! {
    /// Unique identifier for a task within a schedule's chain.
    TaskId
}

id_type! {
    /// Unique identifier for a backup record.
    BackupId
}

id_type! {
    /// Identifier of one execution instance of a schedule's task chain.
    RunId
}
