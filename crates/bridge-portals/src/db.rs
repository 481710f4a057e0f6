use rusqlite::Connection;

use crate::error::Result;

/// Initialise the portals/messages/logins schema. Safe to call on every
/// startup — uses `IF NOT EXISTS` throughout, mirroring
/// `skynet_sessions::db::init_db`.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS portals (
            portal_id          TEXT NOT NULL,
            receiver_login_id  TEXT NOT NULL,
            room_id            TEXT,
            other_user_id      TEXT NOT NULL DEFAULT '',
            metadata_json      TEXT NOT NULL,
            row_version        INTEGER NOT NULL DEFAULT 0,
            created_at         TEXT NOT NULL,
            updated_at         TEXT NOT NULL,
            PRIMARY KEY (portal_id, receiver_login_id)
        );
        CREATE INDEX IF NOT EXISTS idx_portals_login
            ON portals(receiver_login_id, updated_at DESC);

        CREATE TABLE IF NOT EXISTS messages (
            id                 TEXT PRIMARY KEY,
            portal_id          TEXT NOT NULL,
            receiver_login_id  TEXT NOT NULL,
            mxid               TEXT NOT NULL DEFAULT '',
            sender_id          TEXT NOT NULL,
            timestamp          INTEGER NOT NULL,
            metadata_json      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_portal
            ON messages(portal_id, receiver_login_id, timestamp DESC);

        CREATE TABLE IF NOT EXISTS user_logins (
            id           TEXT PRIMARY KEY,
            login_json   TEXT NOT NULL,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );",
    )?;
    Ok(())
}
