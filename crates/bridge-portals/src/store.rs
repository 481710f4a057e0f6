//! `PortalStore` — §4.2. Wraps a single SQLite connection in a `Mutex`,
//! directly mirroring `skynet_sessions::manager::SessionManager`'s
//! get-or-create / read-back pattern, generalized from one session-per-user
//! table to the portal/message/login schema of §3.

use std::sync::Mutex;

use bridge_core::types::{LoginId, Message, Portal, PortalKey, PortalMetadata, Provider, RoomId, UserLogin};
use rusqlite::Connection;
use tracing::{debug, instrument};

use crate::db::init_db;
use crate::error::{PortalError, Result};

pub struct PortalStore {
    db: Mutex<Connection>,
}

impl PortalStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    #[instrument(skip(self), fields(key = %key))]
    pub fn get(&self, key: &PortalKey) -> Result<Option<Portal>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT room_id, other_user_id, metadata_json FROM portals
             WHERE portal_id = ?1 AND receiver_login_id = ?2",
            rusqlite::params![key.portal_id, key.receiver_login_id.as_str()],
            |row| row_to_portal(key.clone(), row),
        ) {
            Ok(p) => Ok(Some(p)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PortalError::Database(e)),
        }
    }

    /// Return the existing portal or create a bare one (upsert pattern, §4.2).
    ///
    /// Mirrors `SessionManager::get_or_create`: insert-or-ignore, then read
    /// back — this handles the race where two tasks create the same portal
    /// key simultaneously.
    #[instrument(skip(self), fields(key = %key))]
    pub fn get_or_create(&self, key: &PortalKey) -> Result<Portal> {
        if let Some(portal) = self.get(key)? {
            debug!("portal cache hit");
            return Ok(portal);
        }

        let now = chrono::Utc::now().to_rfc3339();
        let metadata = PortalMetadata::default();
        let metadata_json = serde_json::to_string(&metadata)?;

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR IGNORE INTO portals
             (portal_id, receiver_login_id, room_id, other_user_id, metadata_json, row_version, created_at, updated_at)
             VALUES (?1, ?2, NULL, '', ?3, 0, ?4, ?4)",
            rusqlite::params![key.portal_id, key.receiver_login_id.as_str(), metadata_json, now],
        )?;

        db.query_row(
            "SELECT room_id, other_user_id, metadata_json FROM portals
             WHERE portal_id = ?1 AND receiver_login_id = ?2",
            rusqlite::params![key.portal_id, key.receiver_login_id.as_str()],
            |row| row_to_portal(key.clone(), row),
        )
        .map_err(PortalError::Database)
    }

    /// Upsert `portal`, bumping `row_version` — logging-only optimistic
    /// concurrency counter (SPEC_FULL §3), not enforced as a guard here.
    #[instrument(skip(self, portal), fields(key = %portal.key))]
    pub fn save(&self, portal: &Portal) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let metadata_json = serde_json::to_string(&portal.metadata)?;
        let room_id = portal.room_id.as_ref().map(|r| r.0.clone());

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO portals
                (portal_id, receiver_login_id, room_id, other_user_id, metadata_json, row_version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
             ON CONFLICT(portal_id, receiver_login_id) DO UPDATE SET
                room_id = excluded.room_id,
                other_user_id = excluded.other_user_id,
                metadata_json = excluded.metadata_json,
                row_version = portals.row_version + 1,
                updated_at = excluded.updated_at",
            rusqlite::params![
                portal.key.portal_id,
                portal.key.receiver_login_id.as_str(),
                room_id,
                portal.other_user_id,
                metadata_json,
                now,
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self), fields(login = %login))]
    pub fn list_for_login(&self, login: &LoginId) -> Result<Vec<Portal>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT portal_id, room_id, other_user_id, metadata_json FROM portals
             WHERE receiver_login_id = ?1
             ORDER BY updated_at DESC",
        )?;
        let login_id = login.clone();
        let portals = stmt
            .query_map(rusqlite::params![login_id.as_str()], move |row| {
                let portal_id: String = row.get(0)?;
                let room_id: Option<String> = row.get(1)?;
                let other_user_id: String = row.get(2)?;
                let metadata_json: String = row.get(3)?;
                Ok((portal_id, room_id, other_user_id, metadata_json))
            })?
            .filter_map(|r| r.ok())
            .map(|(portal_id, room_id, other_user_id, metadata_json)| {
                let metadata: PortalMetadata = serde_json::from_str(&metadata_json).unwrap_or_default();
                Portal {
                    key: PortalKey::new(portal_id, login_id.clone()),
                    room_id: room_id.map(RoomId),
                    other_user_id,
                    metadata,
                }
            })
            .collect();
        Ok(portals)
    }

    #[instrument(skip(self, msg), fields(portal = %msg.portal_key))]
    pub fn append_message(&self, msg: &Message) -> Result<()> {
        let metadata_json = serde_json::to_string(&msg.metadata)?;
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO messages (id, portal_id, receiver_login_id, mxid, sender_id, timestamp, metadata_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                msg.id,
                msg.portal_key.portal_id,
                msg.portal_key.receiver_login_id.as_str(),
                msg.mxid,
                msg.sender_id,
                msg.timestamp,
                metadata_json,
            ],
        )?;
        Ok(())
    }

    /// Remove a single message row — driven by an upstream chat-network
    /// redaction event (§8 I7: a redacted source message never resurfaces
    /// in a later prompt).
    #[instrument(skip(self), fields(portal = %portal_key))]
    pub fn delete_message(&self, portal_key: &PortalKey, message_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "DELETE FROM messages WHERE id = ?1 AND portal_id = ?2 AND receiver_login_id = ?3",
            rusqlite::params![message_id, portal_key.portal_id, portal_key.receiver_login_id.as_str()],
        )?;
        Ok(())
    }

    /// Most recent `limit` messages for a portal, oldest first — the window
    /// `bridge-turn`'s prompt builder folds into history (§4.7.1).
    #[instrument(skip(self), fields(portal = %key, limit))]
    pub fn messages_for_portal(&self, key: &PortalKey, limit: u32) -> Result<Vec<Message>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, mxid, sender_id, timestamp, metadata_json FROM messages
             WHERE portal_id = ?1 AND receiver_login_id = ?2
             ORDER BY timestamp DESC
             LIMIT ?3",
        )?;
        let key = key.clone();
        let mut messages: Vec<Message> = stmt
            .query_map(
                rusqlite::params![key.portal_id, key.receiver_login_id.as_str(), limit as i64],
                |row| {
                    let id: String = row.get(0)?;
                    let mxid: String = row.get(1)?;
                    let sender_id: String = row.get(2)?;
                    let timestamp: i64 = row.get(3)?;
                    let metadata_json: String = row.get(4)?;
                    Ok((id, mxid, sender_id, timestamp, metadata_json))
                },
            )?
            .filter_map(|r| r.ok())
            .map(|(id, mxid, sender_id, timestamp, metadata_json)| {
                let metadata = serde_json::from_str(&metadata_json).unwrap_or_default();
                Message {
                    id,
                    mxid,
                    portal_key: key.clone(),
                    sender_id,
                    timestamp,
                    metadata,
                }
            })
            .collect();
        messages.reverse();
        Ok(messages)
    }

    #[instrument(skip(self), fields(id))]
    pub fn get_login(&self, id: &str) -> Result<Option<UserLogin>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT login_json FROM user_logins WHERE id = ?1",
            rusqlite::params![id],
            |row| row.get::<_, String>(0),
        ) {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PortalError::Database(e)),
        }
    }

    pub fn get_or_create_login(&self, id: &str, provider: Provider) -> Result<UserLogin> {
        if let Some(login) = self.get_login(id)? {
            return Ok(login);
        }
        let login = UserLogin::new(id, provider);
        self.save_login(&login)?;
        Ok(login)
    }

    #[instrument(skip(self, login), fields(id = %login.id))]
    pub fn save_login(&self, login: &UserLogin) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let json = serde_json::to_string(login)?;
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO user_logins (id, login_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(id) DO UPDATE SET login_json = excluded.login_json, updated_at = excluded.updated_at",
            rusqlite::params![login.id, json, now],
        )?;
        Ok(())
    }

    pub fn list_logins(&self) -> Result<Vec<UserLogin>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT login_json FROM user_logins")?;
        let logins = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .filter_map(|json| serde_json::from_str(&json).ok())
            .collect();
        Ok(logins)
    }
}

fn row_to_portal(key: PortalKey, row: &rusqlite::Row<'_>) -> rusqlite::Result<Portal> {
    let room_id: Option<String> = row.get(0)?;
    let other_user_id: String = row.get(1)?;
    let metadata_json: String = row.get(2)?;
    let metadata: PortalMetadata = serde_json::from_str(&metadata_json).unwrap_or_default();
    Ok(Portal {
        key,
        room_id: room_id.map(RoomId),
        other_user_id,
        metadata,
    })
}
