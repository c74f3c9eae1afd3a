use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

use pylon_backups::BackupLifecycleManager;
use pylon_scheduler::{ScheduleStore, TaskChainExecutor};

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub store: Arc<ScheduleStore>,
    pub backups: Arc<BackupLifecycleManager>,
    pub executor: Arc<TaskChainExecutor>,
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/servers/{server}/schedules",
            get(crate::http::schedules::list).post(crate::http::schedules::create),
        )
        .route(
            "/servers/{server}/schedules/{schedule}",
            get(crate::http::schedules::show)
                .patch(crate::http::schedules::update)
                .delete(crate::http::schedules::remove),
        )
        .route(
            "/servers/{server}/schedules/{schedule}/results",
            get(crate::http::schedules::results),
        )
        .route(
            "/servers/{server}/schedules/{schedule}/tasks",
            post(crate::http::schedules::create_task),
        )
        .route(
            "/servers/{server}/schedules/{schedule}/tasks/{task}",
            patch(crate::http::schedules::update_task)
                .delete(crate::http::schedules::remove_task),
        )
        .route(
            "/servers/{server}/backups",
            get(crate::http::backups::list).post(crate::http::backups::create),
        )
        .route(
            "/backups/{backup}",
            get(crate::http::backups::show).delete(crate::http::backups::remove),
        )
        .route("/backups/{backup}/lock", post(crate::http::backups::lock))
        .route(
            "/backups/{backup}/restore",
            post(crate::http::backups::restore),
        )
        .route(
            "/backups/{backup}/complete",
            post(crate::http::backups::complete),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
