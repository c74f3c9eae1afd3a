use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduling schema in `conn`.
///
/// Creates the `schedules`, `tasks` and `task_runs` tables (idempotent) and
/// an index on `next_run_at` so the per-tick due query stays cheap with
/// thousands of schedules.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS schedules (
            id               TEXT    NOT NULL PRIMARY KEY,
            server_id        TEXT    NOT NULL,
            name             TEXT    NOT NULL,
            cron             TEXT    NOT NULL,   -- 'm h dom mon dow'
            is_active        INTEGER NOT NULL DEFAULT 1,
            only_when_online INTEGER NOT NULL DEFAULT 0,
            last_run_at      TEXT,               -- RFC 3339 or NULL
            next_run_at      TEXT,               -- RFC 3339 or NULL
            last_run_ok      INTEGER,            -- NULL until first run
            created_at       TEXT    NOT NULL,
            updated_at       TEXT    NOT NULL
        ) STRICT;

        -- Efficient polling: SELECT … WHERE next_run_at <= ?
        CREATE INDEX IF NOT EXISTS idx_schedules_next_run_at
            ON schedules (next_run_at);
        CREATE INDEX IF NOT EXISTS idx_schedules_server_id
            ON schedules (server_id);

        CREATE TABLE IF NOT EXISTS tasks (
            id                  TEXT    NOT NULL PRIMARY KEY,
            schedule_id         TEXT    NOT NULL REFERENCES schedules(id) ON DELETE CASCADE,
            sort_order          INTEGER NOT NULL,
            action              TEXT    NOT NULL,   -- JSON-encoded TaskAction
            time_offset_secs    INTEGER NOT NULL DEFAULT 0,
            continue_on_failure INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT    NOT NULL,
            updated_at          TEXT    NOT NULL,
            UNIQUE (schedule_id, sort_order)
        ) STRICT;

        -- Run history, keyed so retried result delivery stays idempotent.
        CREATE TABLE IF NOT EXISTS task_runs (
            run_id       TEXT NOT NULL,
            task_id      TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            succeeded    INTEGER NOT NULL,
            error_detail TEXT,
            recorded_at  TEXT NOT NULL,
            PRIMARY KEY (run_id, task_id)
        ) STRICT;
        ",
    )?;
    Ok(())
}
