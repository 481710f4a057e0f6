use rusqlite::Connection;

use crate::error::Result;

/// Create the `jobs` table (idempotent) and an index on `next_run` so the
/// polling query stays cheap as the table grows.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id          TEXT    NOT NULL PRIMARY KEY,
            name        TEXT    NOT NULL,
            schedule    TEXT    NOT NULL,
            action      TEXT    NOT NULL,
            status      TEXT    NOT NULL DEFAULT 'pending',
            last_run    TEXT,
            next_run    TEXT,
            run_count   INTEGER NOT NULL DEFAULT 0,
            max_runs    INTEGER,
            created_at  TEXT    NOT NULL,
            updated_at  TEXT    NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_jobs_next_run ON jobs (next_run);
        ",
    )?;
    Ok(())
}
