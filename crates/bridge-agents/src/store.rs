use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{debug, instrument};

use crate::error::{AgentError, Result};
use crate::presets::built_in_presets;
use crate::types::{is_valid_agent_id, AgentDefinition, AgentModelConfig, ResponseMode, RESERVED_AGENT_IDS};

/// Adapter over chat-network account data — §4.3.
///
/// Backed by a single SQLite connection per `skynet_sessions::SessionManager`
/// convention: one `Mutex<Connection>`, parameterized SQL, no ORM.
pub struct AgentStore {
    db: Mutex<Connection>,
    login_id: String,
}

impl AgentStore {
    pub fn new(conn: Connection, login_id: impl Into<String>) -> Self {
        Self {
            db: Mutex::new(conn),
            login_id: login_id.into(),
        }
    }

    /// Union of built-in presets and user-stored agents; a user override
    /// shadows a preset with the same id (§4.3).
    #[instrument(skip(self))]
    pub fn load_agents(&self) -> Result<BTreeMap<String, AgentDefinition>> {
        let mut agents: BTreeMap<String, AgentDefinition> = built_in_presets()
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();

        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, name, description, model_primary, model_fallbacks, system_prompt,
                    tools_profile, response_mode, avatar_url, created_at, updated_at
             FROM user_agents WHERE login_id = ?1",
        )?;
        let rows = stmt.query_map(params![self.login_id], row_to_agent)?;
        for row in rows {
            let agent = row?;
            agents.insert(agent.id.clone(), agent);
        }
        debug!(count = agents.len(), "loaded agents");
        Ok(agents)
    }

    pub fn get(&self, id: &str) -> Result<Option<AgentDefinition>> {
        Ok(self.load_agents()?.remove(id))
    }

    /// Persist a user-defined agent. Rejects reserved and malformed ids, and
    /// refuses to overwrite a built-in preset in place (§4.3).
    #[instrument(skip(self, def))]
    pub fn save(&self, mut def: AgentDefinition) -> Result<AgentDefinition> {
        if RESERVED_AGENT_IDS.contains(&def.id.as_str()) {
            return Err(AgentError::ReservedId(def.id));
        }
        if !is_valid_agent_id(&def.id) {
            return Err(AgentError::InvalidId(def.id));
        }
        if built_in_presets().iter().any(|p| p.id == def.id) {
            return Err(AgentError::ImmutablePreset(def.id));
        }

        let now = Utc::now().to_rfc3339();
        if def.created_at.is_empty() {
            def.created_at = now.clone();
        }
        def.updated_at = now;
        def.is_preset = false;

        let fallbacks_json = serde_json::to_string(&def.model.fallbacks)?;
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO user_agents
                (id, login_id, name, description, model_primary, model_fallbacks,
                 system_prompt, tools_profile, response_mode, avatar_url, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)
             ON CONFLICT(id) DO UPDATE SET
                name=excluded.name, description=excluded.description,
                model_primary=excluded.model_primary, model_fallbacks=excluded.model_fallbacks,
                system_prompt=excluded.system_prompt, tools_profile=excluded.tools_profile,
                response_mode=excluded.response_mode, avatar_url=excluded.avatar_url,
                updated_at=excluded.updated_at",
            params![
                def.id,
                self.login_id,
                def.name,
                def.description,
                def.model.primary,
                fallbacks_json,
                def.system_prompt,
                def.tools_profile,
                response_mode_str(def.response_mode),
                def.avatar_url,
                def.created_at,
                def.updated_at,
            ],
        )?;
        Ok(def)
    }

    #[instrument(skip(self))]
    pub fn delete(&self, id: &str) -> Result<()> {
        if built_in_presets().iter().any(|p| p.id == id) {
            return Err(AgentError::ImmutablePreset(id.to_string()));
        }
        let db = self.db.lock().unwrap();
        let rows = db.execute(
            "DELETE FROM user_agents WHERE id = ?1 AND login_id = ?2",
            params![id, self.login_id],
        )?;
        if rows == 0 {
            return Err(AgentError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Preset name or stored `name` — §4.1 display-name rule for agent ghosts.
    pub fn display_name(&self, id: &str) -> Result<String> {
        Ok(self
            .get(id)?
            .map(|a| a.name)
            .unwrap_or_else(|| id.to_string()))
    }
}

fn response_mode_str(mode: ResponseMode) -> &'static str {
    match mode {
        ResponseMode::Natural => "natural",
        ResponseMode::Raw => "raw",
    }
}

fn row_to_agent(row: &rusqlite::Row) -> rusqlite::Result<AgentDefinition> {
    let fallbacks_json: String = row.get(4)?;
    let fallbacks: Vec<String> = serde_json::from_str(&fallbacks_json).unwrap_or_default();
    let response_mode_str: String = row.get(7)?;
    Ok(AgentDefinition {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        model: AgentModelConfig {
            primary: row.get(3)?,
            fallbacks,
        },
        system_prompt: row.get(5)?,
        tools_profile: row.get(6)?,
        response_mode: if response_mode_str == "raw" {
            ResponseMode::Raw
        } else {
            ResponseMode::Natural
        },
        avatar_url: row.get(8)?,
        is_preset: false,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> AgentStore {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        AgentStore::new(conn, "login1")
    }

    #[test]
    fn presets_are_always_present() {
        let s = store();
        let agents = s.load_agents().unwrap();
        assert!(agents.contains_key("beep"));
        assert!(agents.contains_key("boss"));
    }

    #[test]
    fn reserved_ids_are_rejected() {
        let s = store();
        let def = AgentDefinition {
            id: "boss".to_string(),
            name: "x".to_string(),
            description: String::new(),
            model: AgentModelConfig::default(),
            system_prompt: String::new(),
            tools_profile: "default".to_string(),
            response_mode: ResponseMode::Natural,
            avatar_url: String::new(),
            is_preset: false,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert!(matches!(s.save(def), Err(AgentError::ReservedId(_))));
    }

    #[test]
    fn invalid_id_is_rejected() {
        let s = store();
        let mut def = AgentDefinition {
            id: "My Agent!".to_string(),
            name: "x".to_string(),
            description: String::new(),
            model: AgentModelConfig::default(),
            system_prompt: String::new(),
            tools_profile: "default".to_string(),
            response_mode: ResponseMode::Natural,
            avatar_url: String::new(),
            is_preset: false,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert!(matches!(s.save(def.clone()), Err(AgentError::InvalidId(_))));
        def.id = "my-agent".to_string();
        assert!(s.save(def).is_ok());
    }

    #[test]
    fn save_and_overlay_shadows_preset_lookup_but_not_storage() {
        let s = store();
        let def = AgentDefinition {
            id: "researcher".to_string(),
            name: "Researcher".to_string(),
            description: "desc".to_string(),
            model: AgentModelConfig {
                primary: "gpt-4o".to_string(),
                fallbacks: vec![],
            },
            system_prompt: "You research things.".to_string(),
            tools_profile: "default".to_string(),
            response_mode: ResponseMode::Natural,
            avatar_url: String::new(),
            is_preset: false,
            created_at: String::new(),
            updated_at: String::new(),
        };
        s.save(def).unwrap();
        let loaded = s.get("researcher").unwrap().unwrap();
        assert_eq!(loaded.name, "Researcher");
        assert!(!loaded.is_preset);

        s.delete("researcher").unwrap();
        assert!(s.get("researcher").unwrap().is_none());
    }
}
