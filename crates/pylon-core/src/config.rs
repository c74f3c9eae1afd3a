use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 18075;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Cron precision is minute-level; ticking faster only tightens dispatch
/// latency, ticking slower than 60s can miss whole cron minutes.
pub const MAX_TICK_SECS: u64 = 60;
/// Hard ceiling for a task's pre-execution delay.
pub const MAX_TASK_OFFSET_SECS: u32 = 900;

/// Top-level config (pylon.toml + PYLON_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PylonConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub node: NodeConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub backups: BackupsConfig,
}

/// Bind address for the exposed engine API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Connection details for the node daemon that hosts the game servers.
/// Every command, power signal, backup and restore goes through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Base URL without trailing slash, e.g. "http://10.0.0.5:8080".
    pub base_url: String,
    /// Bearer token for the node daemon API.
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Tick cadence in seconds. Values above 60 are clamped at startup.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
        }
    }
}

/// Which backup states occupy a slot when the rotation limit is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RotationCounting {
    /// Pending and successful backups count; failed ones do not.
    #[default]
    NonFailed,
    /// Every record counts, whatever its state.
    All,
    /// Only successful backups count.
    SuccessfulOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupsConfig {
    /// Per-server backup limit. The API layer may override per call when the
    /// panel knows a server-specific limit.
    #[serde(default = "default_backup_limit")]
    pub limit: u32,
    #[serde(default)]
    pub counting: RotationCounting,
}

impl Default for BackupsConfig {
    fn default() -> Self {
        Self {
            limit: default_backup_limit(),
            counting: RotationCounting::default(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_tick_secs() -> u64 {
    10
}
fn default_backup_limit() -> u32 {
    5
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.pylon/pylon.db", home)
}

impl PylonConfig {
    /// Load config from a TOML file with PYLON_* env var overrides.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let mut config: PylonConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("PYLON_").split("_"))
            .extract()
            .map_err(|e| crate::error::PylonError::Config(e.to_string()))?;

        if config.scheduler.tick_secs == 0 || config.scheduler.tick_secs > MAX_TICK_SECS {
            config.scheduler.tick_secs = config.scheduler.tick_secs.clamp(1, MAX_TICK_SECS);
        }

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.pylon/pylon.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let http = HttpConfig::default();
        assert_eq!(http.port, DEFAULT_PORT);
        let sched = SchedulerConfig::default();
        assert!(sched.tick_secs <= MAX_TICK_SECS);
        assert_eq!(RotationCounting::default(), RotationCounting::NonFailed);
    }
}
