use rusqlite::Connection;

use crate::error::Result;

/// Initialise the backup schema in `conn` (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS backups (
            id               TEXT    NOT NULL PRIMARY KEY,
            server_id        TEXT    NOT NULL,
            name             TEXT    NOT NULL,
            ignored_patterns TEXT    NOT NULL DEFAULT '',
            is_locked        INTEGER NOT NULL DEFAULT 0,
            state            TEXT    NOT NULL DEFAULT 'pending',
            size_bytes       INTEGER,            -- NULL until successful
            checksum         TEXT,
            created_at       TEXT    NOT NULL,
            completed_at     TEXT
        ) STRICT;

        -- Rotation scans per server, oldest first.
        CREATE INDEX IF NOT EXISTS idx_backups_server_created
            ON backups (server_id, created_at);
        ",
    )?;
    Ok(())
}
