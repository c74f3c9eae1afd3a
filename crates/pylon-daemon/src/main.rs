use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use pylon_backups::BackupLifecycleManager;
use pylon_core::config::PylonConfig;
use pylon_remote::{BackupProducer, HttpRemote, ServerGateway};
use pylon_scheduler::{Scheduler, ScheduleStore, TaskChainExecutor};

mod app;
mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pylon_daemon=info,pylon_scheduler=info,pylon_backups=info,tower_http=debug".into()
            }),
        )
        .init();

    // load config: explicit path via PYLON_CONFIG > ~/.pylon/pylon.toml
    let config_path = std::env::var("PYLON_CONFIG").ok();
    let config = PylonConfig::load(config_path.as_deref())?;

    let bind = config.http.bind.clone();
    let port = config.http.port;

    // initialize SQLite database — single file for all subsystems
    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    // run all schema migrations (idempotent)
    pylon_scheduler::db::init_db(&db)?;
    pylon_backups::db::init_db(&db)?;
    info!("database migrations complete");

    // one outbound client for the node daemon, shared by both subsystems
    let remote = Arc::new(HttpRemote::new(
        config.node.base_url.clone(),
        config.node.token.clone(),
    ));
    let gateway: Arc<dyn ServerGateway> = remote.clone();
    let producer: Arc<dyn BackupProducer> = remote.clone();

    // subsystems — each gets its own connection for thread safety
    let store = Arc::new(ScheduleStore::new(rusqlite::Connection::open(db_path)?)?);
    let backups = Arc::new(BackupLifecycleManager::new(
        rusqlite::Connection::open(db_path)?,
        producer,
        gateway.clone(),
        config.backups.clone(),
    )?);
    let executor = Arc::new(TaskChainExecutor::new(
        store.clone(),
        gateway.clone(),
        backups.clone(),
    ));

    // spawn the scheduler tick loop in the background
    let scheduler = Scheduler::new(
        store.clone(),
        executor.clone(),
        gateway,
        config.scheduler.tick_secs,
    );
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    let state = Arc::new(app::AppState {
        store,
        backups,
        executor,
    });
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("Pylon daemon listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    // signal scheduler to stop
    let _ = shutdown_tx.send(true);
    Ok(())
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
