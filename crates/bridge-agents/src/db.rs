use rusqlite::Connection;

use crate::error::Result;

/// User-defined agents are persisted as account data in the real bridge
/// (§4.3 "adapter over chat-network account data"); the reference
/// implementation here backs that adapter with a local table so the store is
/// independently testable.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS user_agents (
            id             TEXT PRIMARY KEY,
            login_id       TEXT NOT NULL,
            name           TEXT NOT NULL,
            description    TEXT NOT NULL,
            model_primary  TEXT NOT NULL,
            model_fallbacks TEXT NOT NULL,
            system_prompt  TEXT NOT NULL,
            tools_profile  TEXT NOT NULL,
            response_mode  TEXT NOT NULL,
            avatar_url     TEXT NOT NULL,
            created_at     TEXT NOT NULL,
            updated_at     TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_user_agents_login ON user_agents(login_id);",
    )?;
    Ok(())
}
