//! `ChatFactory` — §4.5. Allocates chat slugs, creates rooms, and forks
//! conversations. Grounded in `skynet_sessions::manager::SessionManager` for
//! the persistence shape, generalized with the room-creation and
//! message-replay steps §4.5 adds on top.

use std::sync::Arc;

use bridge_agents::{AgentDefinition, AgentStore};
use bridge_capabilities::CapabilityResolver;
use bridge_chatnet::types::{RoomCreateRequest, TimelineEventType};
use bridge_chatnet::ChatNetwork;
use bridge_core::types::{LoginId, Message, Portal, PortalKey, Provider};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::store::PortalStore;

/// Replay cap for `fork` — §4.5 "load up to 10000 messages".
const FORK_MESSAGE_LIMIT: u32 = 10_000;

#[derive(Debug, Clone, Default)]
pub struct InitPortalOptions {
    pub model: Option<String>,
    pub title: Option<String>,
    pub system_prompt: Option<String>,
    pub copy_from: Option<PortalKey>,
    pub portal_key: Option<PortalKey>,
}

pub struct ChatFactory {
    store: Arc<PortalStore>,
    network: Arc<dyn ChatNetwork>,
    login_id: LoginId,
    /// Serializes `next_chat_index` allocation for this login — §4.5.
    index_lock: AsyncMutex<()>,
}

impl ChatFactory {
    pub fn new(store: Arc<PortalStore>, network: Arc<dyn ChatNetwork>, login_id: LoginId) -> Self {
        Self {
            store,
            network,
            login_id,
            index_lock: AsyncMutex::new(()),
        }
    }

    #[instrument(skip(self))]
    async fn allocate_next_chat_index(&self) -> Result<u32> {
        let _guard = self.index_lock.lock().await;
        let mut login = self.store.get_or_create_login(self.login_id.as_str(), Provider::Openai)?;
        let index = login.next_chat_index;
        login.next_chat_index += 1;
        self.store.save_login(&login)?;
        Ok(index)
    }

    /// Best-effort rollback of an index allocation that failed to produce a
    /// usable portal (e.g. room creation failed) — never worth returning an
    /// error over, since the allocated slug is simply left unused otherwise.
    async fn release_chat_index(&self, index: u32) {
        let _guard = self.index_lock.lock().await;
        if let Ok(mut login) = self.store.get_or_create_login(self.login_id.as_str(), Provider::Openai) {
            if login.next_chat_index == index + 1 {
                login.next_chat_index = index;
                let _ = self.store.save_login(&login);
            }
        }
    }

    /// §4.5 `init_portal`: allocates a slug, creates or fetches the portal
    /// row, installs metadata, and creates the backing room with the model
    /// ghost as the sole other member.
    #[instrument(skip(self, opts))]
    pub async fn init_portal(&self, opts: InitPortalOptions) -> Result<Portal> {
        let index = self.allocate_next_chat_index().await?;
        let portal_id = opts
            .portal_key
            .as_ref()
            .map(|k| k.portal_id.clone())
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        let key = PortalKey::new(portal_id, self.login_id.clone());
        let mut portal = self.store.get_or_create(&key)?;

        if let Some(copy_from) = &opts.copy_from {
            if let Some(source) = self.store.get(copy_from)? {
                portal.metadata = source.metadata.clone();
            }
        }

        portal.metadata.slug = format!("chat-{:04}", index + 1);
        if let Some(model) = &opts.model {
            portal.metadata.model = model.clone();
        }
        if let Some(title) = &opts.title {
            portal.metadata.title = title.clone();
        } else if portal.metadata.title.is_empty() {
            portal.metadata.title = portal.metadata.slug.clone();
        }
        if let Some(system_prompt) = &opts.system_prompt {
            portal.metadata.system_prompt = system_prompt.clone();
        }
        portal.metadata.capabilities = CapabilityResolver::resolve(&portal.metadata.model);

        if portal.other_user_id.is_empty() {
            portal.other_user_id = bridge_identity::model_ghost_id(&self.login_id, &portal.metadata.model);
        }

        if portal.room_id.is_none() {
            match self
                .network
                .create_room(RoomCreateRequest {
                    name: portal.metadata.title.clone(),
                    room_type: "dm",
                    other_user_id: portal.other_user_id.clone(),
                })
                .await
            {
                Ok(room_id) => portal.room_id = Some(room_id),
                Err(e) => {
                    self.release_chat_index(index).await;
                    return Err(crate::error::PortalError::InvalidKey(format!(
                        "room creation failed for {key}: {e}"
                    )));
                }
            }
        }

        self.store.save(&portal)?;
        Ok(portal)
    }

    /// §4.5 `create_agent_chat`: a chat whose AI participant is a named
    /// agent rather than a bare model.
    #[instrument(skip(self, agent))]
    pub async fn create_agent_chat(&self, agent: &AgentDefinition, model: Option<String>) -> Result<Portal> {
        let mut portal = self
            .init_portal(InitPortalOptions {
                model: model.clone(),
                title: Some(agent.name.clone()),
                system_prompt: Some(agent.system_prompt.clone()),
                ..Default::default()
            })
            .await?;

        portal.metadata.agent_id = agent.id.clone();
        if model.is_none() {
            portal.metadata.model = String::new();
        }
        let effective_model = if portal.metadata.model.is_empty() {
            &agent.model.primary
        } else {
            &portal.metadata.model
        };
        portal.other_user_id = if model.is_some() {
            bridge_identity::agent_model_ghost_id(&self.login_id, &agent.id, effective_model)
        } else {
            bridge_identity::agent_ghost_id(&self.login_id, &agent.id)
        };
        portal.metadata.capabilities = CapabilityResolver::resolve(effective_model);
        self.store.save(&portal)?;
        Ok(portal)
    }

    /// §4.5 `create_forked_chat`: copies the source room's settings (model,
    /// prompts, reasoning, capabilities, conversation mode, agent) into a
    /// freshly allocated chat.
    #[instrument(skip(self, source))]
    pub async fn create_forked_chat(&self, source: &Portal) -> Result<Portal> {
        let mut portal = self.init_portal(InitPortalOptions::default()).await?;
        portal.metadata.model = source.metadata.model.clone();
        portal.metadata.system_prompt = source.metadata.system_prompt.clone();
        portal.metadata.agent_prompt = source.metadata.agent_prompt.clone();
        portal.metadata.reasoning_effort = source.metadata.reasoning_effort;
        portal.metadata.capabilities = source.metadata.capabilities.clone();
        portal.metadata.conversation_mode = source.metadata.conversation_mode;
        portal.metadata.agent_id = source.metadata.agent_id.clone();

        portal.other_user_id = if portal.metadata.agent_id.is_empty() {
            bridge_identity::model_ghost_id(&self.login_id, &portal.metadata.model)
        } else if portal.metadata.model.is_empty() {
            bridge_identity::agent_ghost_id(&self.login_id, &portal.metadata.agent_id)
        } else {
            bridge_identity::agent_model_ghost_id(&self.login_id, &portal.metadata.agent_id, &portal.metadata.model)
        };

        self.store.save(&portal)?;
        Ok(portal)
    }

    /// §4.5 `fork`: replay `source`'s history (optionally truncated at
    /// `up_to_event_id`) into a new chat, preserving role and body but
    /// assigning each copied message a fresh id.
    #[instrument(skip(self, source))]
    pub async fn fork(&self, source: &Portal, up_to_event_id: Option<&str>) -> Result<Portal> {
        let history = self.store.messages_for_portal(&source.key, FORK_MESSAGE_LIMIT)?;
        let history: Vec<Message> = match up_to_event_id {
            Some(event_id) => match history.iter().position(|m| m.id == event_id) {
                Some(idx) => history[..=idx].to_vec(),
                None => history,
            },
            None => history,
        };

        let forked = self.create_forked_chat(source).await?;

        let mut skipped = 0u32;
        for msg in &history {
            if msg.metadata.exclude_from_history {
                skipped += 1;
                continue;
            }
            let mut replayed = msg.clone();
            replayed.id = Uuid::now_v7().to_string();
            replayed.mxid = String::new();
            replayed.portal_key = forked.key.clone();
            self.store.append_message(&replayed)?;
        }
        if skipped > 0 {
            info!(skipped, portal = %forked.key, "fork skipped messages excluded from history");
        }

        if let Some(room_id) = &forked.room_id {
            let notice = format!(
                "Forked from \"{}\" — continuing the conversation here.",
                source.metadata.title
            );
            if let Err(e) = self
                .network
                .send_timeline_event(room_id, TimelineEventType::Notice { body: notice }, None)
                .await
            {
                warn!(error = %e, "failed to send fork deep-link notice");
            }
        }

        Ok(forked)
    }

    /// §4.5 `ensure_default_chat`: idempotent — repairs a missing room,
    /// else adopts the lowest-index existing chat, else creates one with
    /// the bootstrap agent; always sends the welcome message exactly once.
    #[instrument(skip(self, agent_store))]
    pub async fn ensure_default_chat(&self, agent_store: &AgentStore) -> Result<Portal> {
        let mut login = self.store.get_or_create_login(self.login_id.as_str(), Provider::Openai)?;

        if let Some(portal_id) = login.default_chat_portal_id.clone() {
            let key = PortalKey::new(portal_id, self.login_id.clone());
            if let Some(mut portal) = self.store.get(&key)? {
                if portal.room_id.is_none() {
                    let room_id = self
                        .network
                        .create_room(RoomCreateRequest {
                            name: portal.metadata.title.clone(),
                            room_type: "dm",
                            other_user_id: portal.other_user_id.clone(),
                        })
                        .await
                        .map_err(|e| crate::error::PortalError::InvalidKey(e.to_string()))?;
                    portal.room_id = Some(room_id);
                    self.store.save(&portal)?;
                }
                self.send_welcome_once(&mut portal).await?;
                return Ok(portal);
            }
        }

        let existing = self
            .store
            .list_for_login(&self.login_id)?
            .into_iter()
            .filter(|p| !p.metadata.slug.is_empty())
            .min_by_key(|p| slug_index(&p.metadata.slug));

        if let Some(mut portal) = existing {
            login.default_chat_portal_id = Some(portal.key.portal_id.clone());
            self.store.save_login(&login)?;
            self.send_welcome_once(&mut portal).await?;
            return Ok(portal);
        }

        let beep = agent_store.get("beep")?.unwrap_or_else(bridge_agents::presets::beep);
        let mut portal = self.create_agent_chat(&beep, None).await?;
        login.default_chat_portal_id = Some(portal.key.portal_id.clone());
        self.store.save_login(&login)?;
        self.send_welcome_once(&mut portal).await?;
        Ok(portal)
    }

    /// §8 I8: mark `welcome_sent` and persist *before* queuing the message,
    /// not after. A concurrent caller that reads the saved portal mid-send
    /// already observes `welcome_sent=true` and skips, so two overlapping
    /// calls for the same portal can never both queue a welcome.
    async fn send_welcome_once(&self, portal: &mut Portal) -> Result<()> {
        if portal.metadata.welcome_sent {
            return Ok(());
        }
        portal.metadata.welcome_sent = true;
        self.store.save(portal)?;

        if let Some(room_id) = &portal.room_id {
            let body = format!("Hello! I'm {}.", agent_display_name(&portal.metadata.agent_id));
            if let Err(e) = self
                .network
                .send_timeline_event(
                    room_id,
                    TimelineEventType::Message {
                        body,
                        formatted_body: None,
                        dont_render_edited: false,
                        extras: None,
                    },
                    None,
                )
                .await
            {
                warn!(error = %e, "failed to send welcome message");
            }
        }
        Ok(())
    }

    /// §4.5 `ensure_builder_room`: idempotent; never accepts overrides once
    /// the room exists — callers only get the existing portal back.
    #[instrument(skip(self, agent_store))]
    pub async fn ensure_builder_room(&self, agent_store: &AgentStore) -> Result<Portal> {
        let login = self.store.get_or_create_login(self.login_id.as_str(), Provider::Openai)?;

        if login.builder_room_id.is_some() {
            if let Some(portal) = self
                .store
                .list_for_login(&self.login_id)?
                .into_iter()
                .find(|p| p.metadata.is_builder_room)
            {
                return Ok(portal);
            }
        }

        let boss = agent_store.get("boss")?.unwrap_or_else(bridge_agents::presets::boss);
        let mut portal = self.create_agent_chat(&boss, None).await?;
        portal.metadata.is_builder_room = true;
        self.store.save(&portal)?;

        let mut login = login;
        login.builder_room_id = portal.room_id.as_ref().map(|r| r.0.clone());
        self.store.save_login(&login)?;

        Ok(portal)
    }
}

fn agent_display_name(agent_id: &str) -> &str {
    if agent_id.is_empty() {
        "the bridge"
    } else {
        agent_id
    }
}

/// Parse the numeric suffix of a `chat-NNNN` slug; non-numeric slugs sort last.
fn slug_index(slug: &str) -> u32 {
    slug.strip_prefix("chat-").and_then(|n| n.parse().ok()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_chatnet::InMemoryChatNetwork;
    use rusqlite::Connection;

    fn factory() -> ChatFactory {
        let conn = Connection::open_in_memory().unwrap();
        let store = Arc::new(PortalStore::new(conn).unwrap());
        let network = Arc::new(InMemoryChatNetwork::new());
        ChatFactory::new(store, network, LoginId::from("login-1"))
    }

    #[tokio::test]
    async fn init_portal_allocates_sequential_slugs() {
        let factory = factory();
        let p1 = factory.init_portal(InitPortalOptions::default()).await.unwrap();
        let p2 = factory.init_portal(InitPortalOptions::default()).await.unwrap();
        assert_eq!(p1.metadata.slug, "chat-0001");
        assert_eq!(p2.metadata.slug, "chat-0002");
        assert!(p1.room_id.is_some());
    }

    #[tokio::test]
    async fn init_portal_assigns_model_ghost_as_other_user() {
        let factory = factory();
        let portal = factory
            .init_portal(InitPortalOptions {
                model: Some("gpt-4o".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(portal.other_user_id, bridge_identity::model_ghost_id(&LoginId::from("login-1"), "gpt-4o"));
    }

    #[tokio::test]
    async fn fork_replays_history_into_new_portal() {
        use bridge_core::types::{Message, MessageMetadata, MessageRole};

        let factory = factory();
        let source = factory
            .init_portal(InitPortalOptions {
                model: Some("gpt-4o".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        for body in ["hi", "hello there"] {
            let meta = MessageMetadata {
                role: MessageRole::User,
                body: body.to_string(),
                ..Default::default()
            };
            let msg = Message::new(source.key.clone(), "user1", meta);
            factory.store.append_message(&msg).unwrap();
        }

        let forked = factory.fork(&source, None).await.unwrap();
        let replayed = factory.store.messages_for_portal(&forked.key, 100).unwrap();
        assert_eq!(replayed.len(), 2);
        assert_eq!(replayed[0].metadata.body, "hi");
        assert_ne!(replayed[0].id, "");
    }

    #[tokio::test]
    async fn ensure_builder_room_is_idempotent() {
        let factory = factory();
        let agent_conn = Connection::open_in_memory().unwrap();
        bridge_agents::db::init_db(&agent_conn).unwrap();
        let agents = bridge_agents::AgentStore::new(agent_conn, "login-1");
        let first = factory.ensure_builder_room(&agents).await.unwrap();
        let second = factory.ensure_builder_room(&agents).await.unwrap();
        assert_eq!(first.key, second.key);
        assert!(second.metadata.is_builder_room);
    }
}
