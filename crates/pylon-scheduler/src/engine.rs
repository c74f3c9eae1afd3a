use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use pylon_remote::ServerGateway;

use crate::executor::TaskChainExecutor;
use crate::store::ScheduleStore;

/// The tick loop that turns persisted `next_run_at` stamps into runs.
///
/// Each tick queries for due schedules and spawns one executor run per
/// schedule, so a long chain on one server never delays another server's
/// schedules. Nothing a run does can take the loop down; failures are
/// logged and the next tick proceeds.
pub struct Scheduler {
    store: Arc<ScheduleStore>,
    executor: Arc<TaskChainExecutor>,
    gateway: Arc<dyn ServerGateway>,
    tick: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<ScheduleStore>,
        executor: Arc<TaskChainExecutor>,
        gateway: Arc<dyn ServerGateway>,
        tick_secs: u64,
    ) -> Self {
        Self {
            store,
            executor,
            gateway,
            tick: Duration::from_secs(tick_secs),
        }
    }

    /// Run until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(tick_secs = self.tick.as_secs(), "scheduler started");
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick_once().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler stopping");
                        return;
                    }
                }
            }
        }
    }

    /// One pass: fetch due schedules and spawn one run per schedule. The
    /// `only_when_online` gate runs inside the spawned task, so a slow or
    /// unreachable node daemon never holds up dispatch of other schedules.
    async fn tick_once(&self) {
        let due = match self.store.due_schedules(Utc::now()) {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "due-schedule query failed, will retry next tick");
                return;
            }
        };
        if due.is_empty() {
            return;
        }
        debug!(count = due.len(), "dispatching due schedules");

        for schedule in due {
            let executor = Arc::clone(&self.executor);
            let gateway = Arc::clone(&self.gateway);
            tokio::spawn(async move {
                if schedule.only_when_online {
                    match gateway.is_online(&schedule.server_id).await {
                        Ok(true) => {}
                        Ok(false) => {
                            // Leave next_run_at untouched; once the server
                            // comes back the schedule fires on the following
                            // tick.
                            debug!(
                                schedule_id = %schedule.id,
                                server_id = %schedule.server_id,
                                "server offline, deferring run"
                            );
                            return;
                        }
                        Err(e) => {
                            warn!(
                                schedule_id = %schedule.id,
                                error = %e,
                                "online check failed, deferring run"
                            );
                            return;
                        }
                    }
                }
                if let Err(e) = executor.execute(&schedule.id).await {
                    error!(schedule_id = %schedule.id, error = %e, "run failed");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rusqlite::Connection;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use pylon_backups::BackupLifecycleManager;
    use pylon_core::config::BackupsConfig;
    use pylon_core::{BackupId, ServerId};
    use pylon_remote::{BackupProducer, PowerAction};

    use crate::cron::CronExpression;
    use crate::store::{NewSchedule, NewTask};
    use crate::types::TaskAction;

    #[derive(Default)]
    struct CountingGateway {
        commands: AtomicUsize,
        online: AtomicBool,
        online_checks: AtomicUsize,
        /// When set, every online check parks here until notified.
        online_gate: Option<Arc<tokio::sync::Notify>>,
    }

    #[async_trait]
    impl ServerGateway for CountingGateway {
        async fn send_command(
            &self,
            _server: &ServerId,
            _command: &str,
        ) -> pylon_remote::Result<()> {
            self.commands.fetch_add(1, Ordering::SeqCst);
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
            if let Some(gate) = &self.online_gate {
                gate.notified().await;
            }
            self.online_checks.fetch_add(1, Ordering::SeqCst);
            Ok(self.online.load(Ordering::SeqCst))
        }

        async fn begin_restore(
            &self,
            _server: &ServerId,
            _backup: &BackupId,
            _truncate: bool,
        ) -> pylon_remote::Result<()> {
            Ok(())
        }
    }

    struct NullProducer;

    #[async_trait]
    impl BackupProducer for NullProducer {
        async fn request(
            &self,
            _server: &ServerId,
            _backup: &BackupId,
            _ignored_patterns: &str,
        ) -> pylon_remote::Result<()> {
            Ok(())
        }

        async fn reclaim(
            &self,
            _server: &ServerId,
            _backup: &BackupId,
        ) -> pylon_remote::Result<()> {
            Ok(())
        }
    }

    struct Harness {
        scheduler: Scheduler,
        store: Arc<ScheduleStore>,
        gateway: Arc<CountingGateway>,
    }

    fn harness() -> Harness {
        harness_with(CountingGateway::default())
    }

    fn harness_with(gateway: CountingGateway) -> Harness {
        let store = Arc::new(
            ScheduleStore::new(Connection::open_in_memory().expect("open in-memory db"))
                .expect("init schema"),
        );
        let gateway = Arc::new(gateway);
        let backups = Arc::new(
            BackupLifecycleManager::new(
                Connection::open_in_memory().expect("open in-memory db"),
                Arc::new(NullProducer),
                gateway.clone(),
                BackupsConfig::default(),
            )
            .expect("init backup schema"),
        );
        let executor = Arc::new(TaskChainExecutor::new(
            store.clone(),
            gateway.clone(),
            backups,
        ));
        let scheduler = Scheduler::new(store.clone(), executor, gateway.clone(), 1);
        Harness {
            scheduler,
            store,
            gateway,
        }
    }

    fn due_schedule(h: &Harness, only_when_online: bool) -> crate::types::Schedule {
        let schedule = h
            .store
            .create_schedule(NewSchedule {
                server_id: ServerId::from("srv-1"),
                name: "nightly".to_string(),
                cron: CronExpression::parse("* * * * *").unwrap(),
                is_active: true,
                only_when_online,
            })
            .unwrap();
        h.store
            .create_task(NewTask {
                schedule_id: schedule.id.clone(),
                sort_order: 1,
                action: TaskAction::Command {
                    payload: "save-all".to_string(),
                },
                time_offset_secs: 0,
                continue_on_failure: false,
            })
            .unwrap();
        // Make it due now.
        let past = Utc::now() - chrono::Duration::minutes(1);
        h.store
            .record_run_result(&schedule.id, Some(past), true)
            .unwrap();
        schedule
    }

    async fn settle() {
        // Let spawned runs finish.
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn tick_dispatches_due_schedules() {
        let h = harness();
        let schedule = due_schedule(&h, false);

        h.scheduler.tick_once().await;
        settle().await;

        assert_eq!(h.gateway.commands.load(Ordering::SeqCst), 1);
        let reloaded = h.store.get_schedule(&schedule.id).unwrap().unwrap();
        assert_eq!(reloaded.last_run_ok, Some(true));
        assert!(reloaded.next_run_at.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn offline_server_defers_gated_schedule() {
        let h = harness();
        let schedule = due_schedule(&h, true);
        h.gateway.online.store(false, Ordering::SeqCst);

        h.scheduler.tick_once().await;
        settle().await;

        assert_eq!(h.gateway.online_checks.load(Ordering::SeqCst), 1);
        assert_eq!(h.gateway.commands.load(Ordering::SeqCst), 0);
        // next_run_at untouched, so it fires once the server is back.
        let reloaded = h.store.get_schedule(&schedule.id).unwrap().unwrap();
        assert!(reloaded.next_run_at.unwrap() < Utc::now());

        h.gateway.online.store(true, Ordering::SeqCst);
        h.scheduler.tick_once().await;
        settle().await;
        assert_eq!(h.gateway.commands.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ungated_schedule_skips_the_online_check() {
        let h = harness();
        due_schedule(&h, false);
        h.gateway.online.store(false, Ordering::SeqCst);

        h.scheduler.tick_once().await;
        settle().await;

        assert_eq!(h.gateway.online_checks.load(Ordering::SeqCst), 0);
        assert_eq!(h.gateway.commands.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_online_check_does_not_block_other_schedules() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let h = harness_with(CountingGateway {
            online_gate: Some(gate),
            ..CountingGateway::default()
        });
        // Gated schedule whose online check never resolves, plus an
        // ungated one.
        due_schedule(&h, true);
        due_schedule(&h, false);

        h.scheduler.tick_once().await;
        settle().await;

        // The ungated schedule ran while the gated one is still parked in
        // its online check.
        assert_eq!(h.gateway.commands.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let h = harness();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { h.scheduler.run(rx).await });
        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
